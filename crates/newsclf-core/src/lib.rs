pub mod base;
pub mod classifier;
pub mod model;
pub mod op;
pub mod tokenizer;

pub use base::error::{ArtifactKind, Error, Result};
pub use classifier::{Classifier, ClassifierConfig, DecisionRule, Inspection, Label, Prediction};
pub use model::SequentialModel;
pub use op::pad::PadSide;
pub use tokenizer::KerasTokenizer;
