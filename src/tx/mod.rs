//! Transaction Module
//!
//! Build, sign and push for self-custody transfers.

mod broadcaster;
mod builder;
mod cancellation;
mod flow;
mod signer;
pub mod validation;

pub use broadcaster::*;
pub use builder::*;
pub use cancellation::*;
pub use flow::*;
pub use signer::*;
