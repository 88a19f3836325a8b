//! Data model: dynamic row values, parsed test definitions, and the result
//! structures consumed by reporting.

pub mod definition;
pub mod result;
pub mod value;

pub use definition::{SqlBody, StepSpec, TestDefinition, TestMetadata};
pub use result::{StepResult, TestResult};
pub use value::{Row, Value};
