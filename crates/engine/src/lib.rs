pub mod calc;
pub mod dep_graph;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod path;
pub mod recalc;
pub mod regression;
pub mod rule;
pub mod rules;
pub mod session;
pub mod value;
pub mod worksheet;

pub use document::{FieldDocument, FieldState, MemoryDocument, SetOptions};
pub use engine::{DerivedFields, EngineOptions, MAX_PASSES};
pub use error::{ComputeError, PathError, RuleSetError, WorksheetError};
pub use path::{field_path, Address, FieldPath, Method, Section};
pub use recalc::RecalcReport;
pub use rule::{should_auto_default, DerivedRule, Guard, RuleContext, RuleSet};
pub use session::{Edit, FinalValues, Session, WorksheetInput};
pub use value::FieldValue;
pub use worksheet::Worksheet;
