pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod message;
pub mod queue;
pub mod route;
pub mod scheduler;
pub mod subscriber;
