use eventree_derive::eventree_error;
use std::borrow::Cow;

#[eventree_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Empty name{}", format_context(.context))]
    EmptyName { context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), std::io::Error> {
    Err(std::io::Error::other("disk gone"))
}

fn main() {
    let err = read().context("reading listeners").unwrap_err();
    assert_eq!(err.kind(), "Io");
    assert_eq!(err.to_string(), "IO error (reading listeners): disk gone");

    let err: DemoError = "boom".into();
    assert_eq!(err.kind(), "Internal");

    let err = Err::<(), _>(DemoError::EmptyName { context: None }).context("event").unwrap_err();
    assert_eq!(err.to_string(), "Empty name (event)");
}
