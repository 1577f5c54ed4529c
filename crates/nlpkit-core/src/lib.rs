pub mod config;
pub mod error;
pub mod models;

pub use config::{GcnConfig, Seq2SeqConfig, SourceKind};
pub use error::CoreError;
pub use models::encoder_decoder::EncoderDecoder;
pub use models::gcn::Gcn;
pub use models::Seq2SeqModel;
