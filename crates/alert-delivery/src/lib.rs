//! Alert artifacts and their delivery over the Telegram Bot API
//!
//! Once a watchlist match exists, three artifacts go to every recipient:
//! a Markdown text summary, a short synthesized voice clip, and the marked
//! copy of the cause list. Each (recipient, artifact) pair is one
//! independent network call; failures are captured per task into a
//! [`DeliveryReport`] instead of aborting the remaining sends.

pub mod deliver;
pub mod error;
pub mod payload;
pub mod speech;
pub mod telegram;

pub use deliver::{deliver_all, Artifact, DeliveryAttempt, DeliveryReport};
pub use error::DeliveryError;
pub use payload::{alert_message, AlertPayload};
pub use speech::{alert_script, synthesize};
pub use telegram::{AlertTransport, TelegramClient};
