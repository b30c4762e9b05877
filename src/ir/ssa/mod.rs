//! On-the-fly SSA construction.
//!
//! [`GraphConstructor`] implements variable renaming without dominance
//! information (Braun et al., "Simple and Efficient Construction of Static
//! Single Assignment Form"). [`SsaTranslation`] walks one function's AST and
//! drives the constructor.

pub mod constructor;
pub mod translate;

pub use constructor::GraphConstructor;
pub use translate::SsaTranslation;
