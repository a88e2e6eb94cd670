pub mod error;
pub mod types;

pub use error::OutdialError;
pub use types::{
    AnsweredBy, CallAction, CallId, CallMessage, CallSession, CallState, PhoneNumber,
};
