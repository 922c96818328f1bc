use crate::errors::{RelayError, Result};
use http::HeaderValue;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use std::collections::HashMap;
use std::convert::Infallible;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const JSON: &str = "application/json";
const MULTIPART: &str = "multipart/form-data";

/// Collects a request body, failing once more than `limit` bytes arrive.
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RelayError::PayloadTooLarge { limit })
        }
        Err(e) => Err(RelayError::RequestBodyError(e.to_string())),
    }
}

/// String fields of a form body, submitted as JSON, urlencoded or multipart.
#[derive(Debug, Default)]
pub struct FormFields {
    // `None` marks a field whose JSON value was not a string.
    fields: HashMap<String, Option<String>>,
}

impl FormFields {
    /// Parses `body` according to `content_type`. A missing content type is read as JSON.
    pub async fn parse(content_type: Option<&HeaderValue>, body: &[u8]) -> Result<Self> {
        let content_type = match content_type {
            Some(value) => value
                .to_str()
                .map_err(|_| RelayError::UnsupportedMediaType("<non-ascii>".to_string()))?,
            None => JSON,
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            FORM_URLENCODED => Ok(Self::from_urlencoded(body)),
            JSON => Self::from_json(body),
            MULTIPART => Self::from_multipart(content_type, body).await,
            other => Err(RelayError::UnsupportedMediaType(other.to_string())),
        }
    }

    fn from_urlencoded(body: &[u8]) -> Self {
        let fields = url::form_urlencoded::parse(body)
            .map(|(name, value)| (name.into_owned(), Some(value.into_owned())))
            .collect();
        Self { fields }
    }

    fn from_json(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)
            .map_err(|e| RelayError::RequestBodyError(format!("invalid JSON object: {e}")))?;

        let fields = object
            .into_iter()
            .filter_map(|(name, value)| match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some((name, Some(s))),
                _ => Some((name, None)),
            })
            .collect();
        Ok(Self { fields })
    }

    // File parts are skipped; only text fields are collected.
    async fn from_multipart(content_type: &str, body: &[u8]) -> Result<Self> {
        let boundary = multer::parse_boundary(content_type)
            .map_err(|e| RelayError::RequestBodyError(e.to_string()))?;
        let chunk = Bytes::copy_from_slice(body);
        let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(chunk) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| RelayError::RequestBodyError(e.to_string()))?
        {
            if field.file_name().is_some() {
                continue;
            }
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|e| RelayError::RequestBodyError(e.to_string()))?;
            fields.insert(name, Some(value));
        }
        Ok(Self { fields })
    }

    /// Value of a field that must be present and non-empty.
    pub fn required(&self, name: &'static str) -> Result<&str> {
        match self.fields.get(name) {
            Some(Some(value)) if !value.is_empty() => Ok(value.as_str()),
            Some(None) => Err(RelayError::InvalidField {
                field: name,
                reason: "expected a string".to_string(),
            }),
            _ => Err(RelayError::MissingField(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn json() -> HeaderValue {
        HeaderValue::from_static("application/json; charset=utf-8")
    }

    #[tokio::test]
    async fn test_read_body_limit() {
        let body = Full::new(Bytes::from_static(b"0123456789"));
        assert_eq!(read_body(body, 10).await.unwrap(), "0123456789");

        let body = Full::new(Bytes::from_static(b"0123456789A"));
        assert!(matches!(
            read_body(body, 10).await,
            Err(RelayError::PayloadTooLarge { limit: 10 })
        ));
    }

    #[tokio::test]
    async fn test_json_fields() {
        let form = FormFields::parse(
            Some(&json()),
            br#"{"token_digest":"d1","install_id":"A","count":3,"flag":true,"gone":null,"empty":""}"#,
        )
        .await
        .unwrap();

        assert_eq!(form.required("token_digest").unwrap(), "d1");
        assert_eq!(form.required("install_id").unwrap(), "A");
        assert!(matches!(
            form.required("count"),
            Err(RelayError::InvalidField { field: "count", .. })
        ));
        assert!(matches!(
            form.required("flag"),
            Err(RelayError::InvalidField { field: "flag", .. })
        ));
        assert!(matches!(form.required("gone"), Err(RelayError::MissingField("gone"))));
        assert!(matches!(form.required("empty"), Err(RelayError::MissingField("empty"))));
        assert!(matches!(form.required("other"), Err(RelayError::MissingField("other"))));
    }

    #[tokio::test]
    async fn test_urlencoded_fields() {
        let content_type = HeaderValue::from_static("application/x-www-form-urlencoded");
        let form = FormFields::parse(
            Some(&content_type),
            b"client_id=app%201&server_key=BAbc-_x&empty=",
        )
        .await
        .unwrap();

        assert_eq!(form.required("client_id").unwrap(), "app 1");
        assert_eq!(form.required("server_key").unwrap(), "BAbc-_x");
        assert!(matches!(form.required("empty"), Err(RelayError::MissingField("empty"))));
    }

    #[tokio::test]
    async fn test_multipart_fields() {
        let content_type = HeaderValue::from_static("multipart/form-data; boundary=X-BOUNDARY");
        let body = concat!(
            "--X-BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"token_digest\"\r\n\r\n",
            "d1\r\n",
            "--X-BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"install_id\"\r\n\r\n",
            "A\r\n",
            "--X-BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "file contents\r\n",
            "--X-BOUNDARY--\r\n",
        );

        let form = FormFields::parse(Some(&content_type), body.as_bytes())
            .await
            .unwrap();
        assert_eq!(form.required("token_digest").unwrap(), "d1");
        assert_eq!(form.required("install_id").unwrap(), "A");
        assert!(matches!(form.required("upload"), Err(RelayError::MissingField("upload"))));
    }

    #[tokio::test]
    async fn test_content_type_handling() {
        // No content type: treated as JSON.
        let form = FormFields::parse(None, br#"{"a":"b"}"#).await.unwrap();
        assert_eq!(form.required("a").unwrap(), "b");

        // Empty body: no fields rather than a parse error.
        let form = FormFields::parse(Some(&json()), b"").await.unwrap();
        assert!(matches!(form.required("a"), Err(RelayError::MissingField("a"))));

        let no_boundary = HeaderValue::from_static("multipart/form-data");
        assert!(matches!(
            FormFields::parse(Some(&no_boundary), b"--x--").await,
            Err(RelayError::RequestBodyError(_))
        ));

        let xml = HeaderValue::from_static("text/xml");
        assert!(matches!(
            FormFields::parse(Some(&xml), b"<a/>").await,
            Err(RelayError::UnsupportedMediaType(_))
        ));

        assert!(matches!(
            FormFields::parse(Some(&json()), b"[1, 2]").await,
            Err(RelayError::RequestBodyError(_))
        ));
    }
}
