pub mod error;
pub mod protocol;
pub mod session;
pub mod subscription;
pub mod view;

pub use error::{ClientError, Result};
pub use session::{ClientSession, ConnectionHandle, SessionConfig};
pub use subscription::ListenerId;
pub use view::{ChatView, NotificationFeed};
