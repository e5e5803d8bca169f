pub mod progress;
pub mod session;
pub mod sftp_like;
pub mod worker;
