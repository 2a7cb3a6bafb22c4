/// Multipart payload that can be rebuilt for every send attempt.
///
/// `reqwest::multipart::Form` is consumed on send, but a request that hits an
/// expired token is replayed after the refresh cycle, so uploads keep their
/// parts in this owned form and convert per attempt. No `Content-Type` header
/// is set by hand; the transport supplies the multipart boundary.
#[derive(Debug, Clone, Default)]
pub struct Multipart {
    parts: Vec<(String, Part)>,
}

#[derive(Debug, Clone)]
enum Part {
    Text(String),
    File {
        data: Vec<u8>,
        file_name: String,
        mime: Option<String>,
    },
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), Part::Text(value.into())));
        self
    }

    /// Add a binary file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push((
            name.into(),
            Part::File {
                data,
                file_name: file_name.into(),
                mime: None,
            },
        ));
        self
    }

    /// Add a binary file field with an explicit MIME type.
    ///
    /// An unparseable MIME string is ignored and the part is sent untyped.
    pub fn file_with_mime(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: Vec<u8>,
        mime: impl Into<String>,
    ) -> Self {
        self.parts.push((
            name.into(),
            Part::File {
                data,
                file_name: file_name.into(),
                mime: Some(mime.into()),
            },
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub(crate) fn to_form(&self) -> reqwest::multipart::Form {
        let mut form = reqwest::multipart::Form::new();
        for (name, part) in &self.parts {
            form = match part {
                Part::Text(value) => form.text(name.clone(), value.clone()),
                Part::File {
                    data,
                    file_name,
                    mime,
                } => {
                    let file_part = reqwest::multipart::Part::bytes(data.clone())
                        .file_name(file_name.clone());
                    let file_part = match mime.as_deref() {
                        Some(mime) => file_part.mime_str(mime).unwrap_or_else(|_| {
                            reqwest::multipart::Part::bytes(data.clone())
                                .file_name(file_name.clone())
                        }),
                        None => file_part,
                    };
                    form.part(name.clone(), file_part)
                }
            };
        }
        form
    }
}
