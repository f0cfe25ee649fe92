pub mod drain;

use bytes::Bytes;
use http_body_util::Full;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[inline]
pub fn empty_body() -> Full<Bytes> {
    Full::new(Bytes::new())
}

#[inline]
pub fn byte_body<B: Into<Bytes>>(bytes: B) -> Full<Bytes> {
    Full::new(bytes.into())
}

/// Encodes `fields` as `application/x-www-form-urlencoded`, keeping their order.
#[must_use]
pub fn form_encode<'a, I>(fields: I) -> Bytes
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    Bytes::from(encoded)
}
