use std::fmt::Write;

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Body returned to the carrier when nothing further is requested.
pub fn empty_acknowledgement() -> String {
    XML_DECLARATION.to_string()
}

/// Instructions of a call-flow response document, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Play {
        url: String,
    },
    /// Open a bidirectional media stream to `url`.
    Connect {
        url: String,
        parameters: Vec<(String, String)>,
    },
    /// Redirect the call signaling to `sip`, reporting the result to `action`.
    Refer {
        action: String,
        method: String,
        sip: String,
    },
}

/// Builder スタイルの応答ドキュメント
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFlowDocument {
    verbs: Vec<Verb>,
}

impl CallFlowDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play { url: url.into() });
        self
    }

    pub fn connect_stream<K, V>(
        mut self,
        url: impl Into<String>,
        parameters: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.verbs.push(Verb::Connect {
            url: url.into(),
            parameters: parameters
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }

    pub fn refer(mut self, action: impl Into<String>, sip: impl Into<String>) -> Self {
        self.verbs.push(Verb::Refer {
            action: action.into(),
            method: "POST".to_string(),
            sip: sip.into(),
        });
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// Value of the first stream parameter called `name`.
    pub fn stream_parameter(&self, name: &str) -> Option<&str> {
        self.verbs.iter().find_map(|verb| match verb {
            Verb::Connect { parameters, .. } => parameters
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push_str("<Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Play { url } => {
                    let _ = write!(out, "<Play>{}</Play>", escape_xml(url));
                }
                Verb::Connect { url, parameters } => {
                    let _ = write!(out, "<Connect><Stream url=\"{}\">", escape_xml(url));
                    for (name, value) in parameters {
                        let _ = write!(
                            out,
                            "<Parameter name=\"{}\" value=\"{}\"/>",
                            escape_xml(name),
                            escape_xml(value)
                        );
                    }
                    out.push_str("</Stream></Connect>");
                }
                Verb::Refer {
                    action,
                    method,
                    sip,
                } => {
                    let _ = write!(
                        out,
                        "<Refer action=\"{}\" method=\"{}\"><Sip>{}</Sip></Refer>",
                        escape_xml(action),
                        escape_xml(method),
                        escape_xml(sip)
                    );
                }
            }
        }
        out.push_str("</Response>");
        out
    }
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
