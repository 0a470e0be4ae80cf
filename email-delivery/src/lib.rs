pub mod alert;
pub mod html;
pub mod sender;

pub use alert::{comment_alert, digest_subject};
pub use html::{convert_inline_markdown, markdown_to_html};
pub use sender::{DigestSender, EmailResult, OutgoingEmail, SendGridSender, SmtpSender, SmtpSettings};
