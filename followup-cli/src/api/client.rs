//! SOAP client for the student directory
//!
//! The directory exposes a single operation we care about,
//! `GetAlunos(nCodigoCliente, sToken, sParametrosBusca)`, which returns the
//! matching student rows. Only their `AlunoID` values are used.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use log::debug;

use super::models::{RemoteRecordId, TenantCredentials};
use super::resilience::RetryableError;

pub const DEFAULT_DIRECTORY_URL: &str = "https://api.sponteeducacional.net.br/WSAPIEdu.asmx";
const SOAP_ACTION: &str = "http://api.sponteeducacional.net.br/GetAlunos";
const SERVICE_NAMESPACE: &str = "http://api.sponteeducacional.net.br/";
const ID_ELEMENT: &str = "AlunoID";

/// Search filter sent as `sParametrosBusca`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFilter {
    TaxId(String),
    Name(String),
}

impl LookupFilter {
    pub fn to_query(&self) -> String {
        match self {
            LookupFilter::TaxId(digits) => format!("CPF={}", digits),
            LookupFilter::Name(name) => format!("Nome={}", name),
        }
    }
}

impl std::fmt::Display for LookupFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Connection, TLS or timeout problem
    Transport(String),
    /// Non-success HTTP status
    Http { status: u16, body: String },
    /// The service answered with a SOAP fault
    Fault(String),
    /// The response could not be parsed
    Malformed(String),
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::Transport(msg) => write!(f, "directory unreachable: {}", msg),
            LookupError::Http { status, body } => {
                write!(f, "directory returned HTTP {}", status)?;
                let body = body.trim();
                if !body.is_empty() {
                    let snippet: String = body.chars().take(200).collect();
                    write!(f, ": {}", snippet)?;
                }
                Ok(())
            }
            LookupError::Fault(msg) => write!(f, "directory fault: {}", msg),
            LookupError::Malformed(msg) => write!(f, "unreadable directory response: {}", msg),
        }
    }
}

impl std::error::Error for LookupError {}

impl RetryableError for LookupError {
    fn is_retryable(&self) -> bool {
        match self {
            LookupError::Transport(_) => true,
            LookupError::Http { status, .. } => *status >= 500 || *status == 429,
            LookupError::Fault(_) | LookupError::Malformed(_) => false,
        }
    }
}

/// Remote directory that maps a filter to record ids
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// All matching record ids, in the order the service returned them
    async fn find_records(
        &self,
        filter: &LookupFilter,
        credentials: &TenantCredentials,
    ) -> Result<Vec<RemoteRecordId>, LookupError>;
}

/// [`DirectoryLookup`] over the SOAP web service
pub struct SoapDirectoryClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl SoapDirectoryClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("followup-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build directory HTTP client")?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }
}

#[async_trait]
impl DirectoryLookup for SoapDirectoryClient {
    async fn find_records(
        &self,
        filter: &LookupFilter,
        credentials: &TenantCredentials,
    ) -> Result<Vec<RemoteRecordId>, LookupError> {
        debug!("GetAlunos {} (client {})", filter, credentials.client_code);

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}\"", SOAP_ACTION))
            .body(build_envelope(filter, credentials))
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        // Faults come back as HTTP 500 with a readable body
        if !status.is_success() {
            if let Err(fault @ LookupError::Fault(_)) = parse_response(&body) {
                return Err(fault);
            }
            return Err(LookupError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }
}

/// SOAP 1.1 request body for `GetAlunos`
pub fn build_envelope(filter: &LookupFilter, credentials: &TenantCredentials) -> String {
    use quick_xml::escape::escape;

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
            "<soap:Body>",
            r#"<GetAlunos xmlns="{ns}">"#,
            "<nCodigoCliente>{client}</nCodigoCliente>",
            "<sToken>{token}</sToken>",
            "<sParametrosBusca>{query}</sParametrosBusca>",
            "</GetAlunos>",
            "</soap:Body>",
            "</soap:Envelope>"
        ),
        ns = SERVICE_NAMESPACE,
        client = escape(credentials.client_code.trim()),
        token = escape(credentials.token.trim()),
        query = escape(filter.to_query().as_str()),
    )
}

/// Extract record ids from a `GetAlunos` response
///
/// Every non-empty `AlunoID` element counts, in document order. A zero id is
/// the service's placeholder for "no student" and is skipped.
pub fn parse_response(xml: &str) -> Result<Vec<RemoteRecordId>, LookupError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| LookupError::Malformed(e.to_string()))?;

    if let Some(fault) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Fault")
    {
        let message = fault
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("faultstring"))
            .and_then(|n| n.text())
            .unwrap_or("unknown fault")
            .trim()
            .to_string();
        return Err(LookupError::Fault(message));
    }

    if !doc
        .descendants()
        .any(|n| n.is_element() && n.tag_name().name() == "Body")
    {
        return Err(LookupError::Malformed("missing SOAP body".to_string()));
    }

    let ids = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case(ID_ELEMENT))
        .filter_map(|n| n.text())
        .map(str::trim)
        .filter(|id| !id.is_empty() && *id != "0")
        .map(RemoteRecordId::new)
        .collect();

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
                "<soap:Body>{}</soap:Body></soap:Envelope>"
            ),
            body
        )
    }

    #[test]
    fn test_filter_queries() {
        assert_eq!(LookupFilter::TaxId("12345678900".into()).to_query(), "CPF=12345678900");
        assert_eq!(LookupFilter::Name("Ana Souza".into()).to_query(), "Nome=Ana Souza");
    }

    #[test]
    fn test_envelope_escapes_values() {
        let creds = TenantCredentials::new("72546", "a<b&c");
        let xml = build_envelope(&LookupFilter::Name("O'Neil & Co".into()), &creds);

        assert!(xml.contains("<nCodigoCliente>72546</nCodigoCliente>"));
        assert!(xml.contains("<sToken>a&lt;b&amp;c</sToken>"));
        assert!(xml.contains("Nome=O&apos;Neil &amp; Co"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }

    #[test]
    fn test_parse_ids_in_document_order() {
        let xml = wrap(concat!(
            r#"<GetAlunosResponse xmlns="http://api.sponteeducacional.net.br/">"#,
            "<GetAlunosResult>",
            "<wsAluno><AlunoID>4512</AlunoID><Nome>Ana</Nome></wsAluno>",
            "<wsAluno><AlunoID> 77 </AlunoID><Nome>Ana</Nome></wsAluno>",
            "</GetAlunosResult></GetAlunosResponse>"
        ));

        let ids = parse_response(&xml).unwrap();
        assert_eq!(ids, vec![RemoteRecordId::new("4512"), RemoteRecordId::new("77")]);
    }

    #[test]
    fn test_parse_no_match() {
        let xml = wrap(concat!(
            r#"<GetAlunosResponse xmlns="http://api.sponteeducacional.net.br/">"#,
            "<GetAlunosResult><wsAluno><AlunoID>0</AlunoID><RetornoOperacao>Nenhum registro</RetornoOperacao></wsAluno>",
            "</GetAlunosResult></GetAlunosResponse>"
        ));

        assert!(parse_response(&xml).unwrap().is_empty());

        let empty = wrap(r#"<GetAlunosResponse xmlns="http://api.sponteeducacional.net.br/"/>"#);
        assert!(parse_response(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_parse_fault() {
        let xml = wrap("<soap:Fault><faultcode>soap:Server</faultcode><faultstring>Token inválido</faultstring></soap:Fault>");
        assert_eq!(parse_response(&xml), Err(LookupError::Fault("Token inválido".to_string())));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_response("<html>"), Err(LookupError::Malformed(_))));
        assert!(matches!(parse_response("<ok/>"), Err(LookupError::Malformed(_))));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LookupError::Transport("reset".into()).is_retryable());
        assert!(LookupError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(LookupError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(!LookupError::Http { status: 401, body: String::new() }.is_retryable());
        assert!(!LookupError::Fault("bad token".into()).is_retryable());
    }
}
