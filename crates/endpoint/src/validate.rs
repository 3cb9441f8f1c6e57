use crate::body::BodyValue;
use crate::content_type::is_textual;
use crate::error::BodyTypeError;

/// Checks that `body` can be sent under `content_type`.
///
/// Binary content-types only accept a string, binary data or a stream: a JSON-like body
/// would otherwise be encoded into something the declared type can't describe.
pub fn validate_body(body: &BodyValue, content_type: Option<&str>) -> Result<(), BodyTypeError> {
    if is_textual(content_type) {
        return Ok(());
    }

    match body {
        BodyValue::Text(_) | BodyValue::Binary(_) | BodyValue::Stream(_) => Ok(()),
        BodyValue::Json(_) | BodyValue::Error(_) => {
            Err(BodyTypeError::new(content_type.unwrap_or_default(), body.kind()))
        }
    }
}
