pub mod event;
pub mod parser;
pub mod rule;

pub use event::{AlarmEvent, Stage};
pub use parser::{AlarmParser, ParsedFile};
pub use rule::{ClassificationRule, RuleError, RuleSet};
