//! [`UiDriver`] over the W3C WebDriver HTTP protocol
//!
//! Talks to a running chromedriver (or any W3C-compliant server). Clicks go
//! through a script so elements hidden behind the site's overlays still
//! receive them.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, info};
use reqwest::Method;
use serde_json::{Value, json};

use super::wait::{WaitConfig, wait_for};
use super::{FollowUpForm, UiDriver, UiError};
use crate::api::{RemoteRecordId, TimeoutConfig};
use crate::config::LoginCredentials;
use crate::tenant::SessionState;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_BASE_URL: &str = "https://www.sponteeducacional.net.br";

/// W3C web element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735a3e8d2b";

mod selectors {
    pub const LOGIN_FIELD: &str = "txtLogin";
    pub const PASSWORD_FIELD: &str = "txtSenha";
    pub const LOGIN_BUTTON: &str = "btnok";
    pub const TENANT_LABEL: &str = "ctl00_spnNomeEmpresa";

    pub const FOLLOW_UP_TAB: &str = "//*[@id='__tab_tab_TabPanel9']";
    pub const INCLUDE_FOLLOW_UP: &str = "tab_TabPanel9_btnIncluirFollowUp_div";
    pub const FOLLOW_UP_FRAME: &str = "//iframe[contains(@src, 'FollowUpCadastro.aspx')]";

    pub const AGENT: &str = "cmbAtendente";
    pub const CHANNEL: &str = "cmbTipoContato";
    pub const APPOINTMENT_TYPE: &str = "cmbTipoAgendamento";
    pub const INTEREST_LEVEL: &str = "cmbGrauInteresse";
    pub const SUBJECT: &str = "txtAssunto";

    pub const SAVE_DIALOG: &str = "//div[@id='updRodapeFixo']//div[@id='btnSalvar_div']";
    pub const SAVE_RECORD: &str = "//div[@id='updRodapeRelativo']//div[@id='btnSalvar_div']";
}

/// Element search strategy plus value
#[derive(Debug, Clone)]
struct Locator {
    using: &'static str,
    value: String,
}

impl Locator {
    fn id(id: &str) -> Self {
        Locator {
            using: "css selector",
            value: format!("[id='{}']", id),
        }
    }

    fn xpath(xpath: impl Into<String>) -> Self {
        Locator {
            using: "xpath",
            value: xpath.into(),
        }
    }
}

/// Failure talking to the WebDriver server
#[derive(Debug, Clone, PartialEq)]
enum WireError {
    Transport(String),
    Protocol { error: String, message: String },
}

impl WireError {
    fn is_no_such_element(&self) -> bool {
        matches!(self, WireError::Protocol { error, .. }
            if error == "no such element" || error == "stale element reference")
    }
}

impl From<WireError> for UiError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Transport(msg) => UiError::SessionLost(format!("webdriver unreachable: {}", msg)),
            WireError::Protocol { error, message } => {
                // Stack traces follow the first line
                let message = message.lines().next().unwrap_or_default().to_string();
                match error.as_str() {
                    "invalid session id" | "no such window" | "session not created" => {
                        UiError::SessionLost(format!("{}: {}", error, message))
                    }
                    _ => UiError::Interaction(format!("{}: {}", error, message)),
                }
            }
        }
    }
}

/// Parse the `value` of a WebDriver response, surfacing protocol errors
fn unwrap_response(status: reqwest::StatusCode, payload: Value) -> Result<Value, WireError> {
    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(WireError::Protocol {
            error: error.to_string(),
            message,
        });
    }
    if !status.is_success() {
        return Err(WireError::Protocol {
            error: format!("http {}", status.as_u16()),
            message: value.to_string(),
        });
    }
    Ok(value)
}

fn element_id(value: &Value) -> Result<String, WireError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WireError::Protocol {
            error: "invalid response".to_string(),
            message: format!("no element reference in {}", value),
        })
}

/// Decode the base64 PNG a screenshot command returns
fn decode_screenshot(value: &Value) -> Result<Vec<u8>, WireError> {
    let encoded = value.as_str().ok_or_else(|| WireError::Protocol {
        error: "invalid response".to_string(),
        message: "screenshot is not a string".to_string(),
    })?;
    general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| WireError::Protocol {
            error: "invalid response".to_string(),
            message: format!("screenshot is not base64: {}", e),
        })
}

fn element_ref(element: &str) -> Value {
    json!({ ELEMENT_KEY: element })
}

/// Quote text for use inside an XPath expression
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Landing page with the login form
pub fn home_url(base_url: &str) -> String {
    format!("{}/Home.aspx", base_url.trim_end_matches('/'))
}

/// Student record page for a record id
pub fn record_url(base_url: &str, id: &RemoteRecordId) -> String {
    format!(
        "{}/SPCad/AlunoCadastro.aspx?cad=true&id={}&ce=1",
        base_url.trim_end_matches('/'),
        id
    )
}

/// Script that points the company selector at `value` and posts back
pub fn tenant_switch_script(value: u32) -> String {
    format!(
        "$('#ctl00_hdnEmpresa').val({});__doPostBack('ctl00$lnkChange','');",
        value
    )
}

/// A live browser session
pub struct WebDriverSession {
    http: reqwest::Client,
    server: String,
    base_url: String,
    session_id: Option<String>,
    wait: WaitConfig,
}

impl WebDriverSession {
    /// Open a new browser session on the WebDriver server at `server_url`
    pub async fn start(server_url: &str, base_url: &str, timeouts: &TimeoutConfig) -> Result<Self, UiError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.http)
            .build()
            .map_err(|e| UiError::SessionLost(format!("cannot build HTTP client: {}", e)))?;

        let mut session = WebDriverSession {
            http,
            server: server_url.trim_end_matches('/').to_string(),
            base_url: base_url.to_string(),
            session_id: None,
            wait: WaitConfig::from(timeouts),
        };

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": ["--start-maximized"] }
                }
            }
        });
        let value = session
            .command(Method::POST, "/session".to_string(), Some(capabilities))
            .await
            .map_err(|e| UiError::SessionLost(format!("cannot start browser: {}", UiError::from(e))))?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| UiError::SessionLost("WebDriver returned no session id".to_string()))?;
        info!("Browser session {} started via {}", id, session.server);
        session.session_id = Some(id.to_string());
        Ok(session)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    async fn command(&self, method: Method, path: String, body: Option<Value>) -> Result<Value, WireError> {
        let url = format!("{}{}", self.server, path);
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WireError::Transport(e.to_string()))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| WireError::Transport(format!("unreadable response: {}", e)))?;

        unwrap_response(status, payload)
    }

    async fn session_command(&self, method: Method, suffix: &str, body: Option<Value>) -> Result<Value, WireError> {
        let Some(id) = &self.session_id else {
            return Err(WireError::Protocol {
                error: "invalid session id".to_string(),
                message: "session already closed".to_string(),
            });
        };
        self.command(method, format!("/session/{}{}", id, suffix), body).await
    }

    async fn navigate(&self, url: &str) -> Result<(), WireError> {
        debug!("Navigating to {}", url);
        self.session_command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn find(&self, locator: &Locator) -> Result<String, WireError> {
        let value = self
            .session_command(
                Method::POST,
                "/element",
                Some(json!({ "using": locator.using, "value": locator.value })),
            )
            .await?;
        element_id(&value)
    }

    async fn find_optional(&self, locator: &Locator) -> Result<Option<String>, UiError> {
        match self.find(locator).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_element(&self, locator: &Locator, step: &str) -> Result<String, UiError> {
        wait_for(&self.wait, step, move || self.find_optional(locator)).await
    }

    async fn click(&self, element: &str) -> Result<(), WireError> {
        self.execute(
            "arguments[0].scrollIntoView();arguments[0].click();",
            vec![element_ref(element)],
        )
        .await
        .map(|_| ())
    }

    /// Native click; needed for `<option>` elements
    async fn native_click(&self, element: &str) -> Result<(), WireError> {
        self.session_command(Method::POST, &format!("/element/{}/click", element), Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn type_text(&self, element: &str, text: &str) -> Result<(), WireError> {
        self.session_command(Method::POST, &format!("/element/{}/clear", element), Some(json!({})))
            .await?;
        self.session_command(
            Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn text(&self, element: &str) -> Result<String, WireError> {
        let value = self
            .session_command(Method::GET, &format!("/element/{}/text", element), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, WireError> {
        self.session_command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn switch_to_frame(&self, frame: Option<&str>) -> Result<(), WireError> {
        let id = frame.map(element_ref).unwrap_or(Value::Null);
        self.session_command(Method::POST, "/frame", Some(json!({ "id": id })))
            .await
            .map(|_| ())
    }

    /// Pick the option whose visible text equals `text`
    async fn select_by_text(&self, select_id: &str, text: &str, step: &str) -> Result<(), UiError> {
        let option = Locator::xpath(format!(
            "//select[@id='{}']/option[normalize-space(.)={}]",
            select_id,
            xpath_literal(text.trim())
        ));
        let element = self
            .wait_element(&option, step)
            .await
            .map_err(|e| match e {
                UiError::Timeout { .. } => UiError::Interaction(format!("no option '{}' for {}", text, step)),
                other => other,
            })?;
        self.native_click(&element).await?;
        debug!("Selected '{}' for {}", text, step);
        Ok(())
    }

    async fn fill_dialog(&self, form: &FollowUpForm) -> Result<(), UiError> {
        let tab = self
            .wait_element(&Locator::xpath(selectors::FOLLOW_UP_TAB), "follow-up tab")
            .await?;
        self.click(&tab).await?;

        let include = self
            .wait_element(&Locator::id(selectors::INCLUDE_FOLLOW_UP), "follow-up include button")
            .await?;
        self.click(&include).await?;

        let frame = self
            .wait_element(&Locator::xpath(selectors::FOLLOW_UP_FRAME), "follow-up dialog")
            .await?;
        self.switch_to_frame(Some(&frame)).await?;

        self.wait_element(&Locator::id(selectors::AGENT), "agent selector")
            .await?;
        self.select_by_text(selectors::AGENT, &form.agent, "agent").await?;
        self.select_by_text(selectors::CHANNEL, &form.channel, "contact channel")
            .await?;
        self.select_by_text(selectors::APPOINTMENT_TYPE, &form.appointment_type, "appointment type")
            .await?;
        self.select_by_text(selectors::INTEREST_LEVEL, &form.interest_level, "interest level")
            .await?;

        let subject = self
            .wait_element(&Locator::id(selectors::SUBJECT), "subject field")
            .await?;
        self.type_text(&subject, &form.subject).await?;

        if !form.submit {
            debug!("Follow-up filled, not submitted");
            return Ok(());
        }

        let save_dialog = self
            .wait_element(&Locator::xpath(selectors::SAVE_DIALOG), "dialog save button")
            .await?;
        self.click(&save_dialog).await?;
        self.switch_to_frame(None).await?;

        let save_record = self
            .wait_element(&Locator::xpath(selectors::SAVE_RECORD), "record save button")
            .await?;
        self.click(&save_record).await?;
        debug!("Follow-up saved");
        Ok(())
    }
}

#[async_trait]
impl UiDriver for WebDriverSession {
    async fn login(&mut self, credentials: &LoginCredentials) -> Result<(), UiError> {
        let this = &*self;
        this.navigate(&home_url(&this.base_url)).await?;

        let login = this
            .wait_element(&Locator::id(selectors::LOGIN_FIELD), "login form")
            .await?;
        this.type_text(&login, &credentials.email).await?;
        let password = this.find(&Locator::id(selectors::PASSWORD_FIELD)).await?;
        this.type_text(&password, credentials.password()).await?;
        let button = this.find(&Locator::id(selectors::LOGIN_BUTTON)).await?;
        this.click(&button).await?;

        this.wait_element(&Locator::id(selectors::TENANT_LABEL), "session header")
            .await
            .map_err(|e| match e {
                UiError::Timeout { .. } => {
                    UiError::SessionLost("login did not complete; check the credentials".to_string())
                }
                other => other,
            })?;
        info!("Logged in as {}", credentials.email);
        Ok(())
    }

    async fn current_tenant(&mut self) -> Result<SessionState, UiError> {
        let this = &*self;
        match this.find_optional(&Locator::id(selectors::TENANT_LABEL)).await? {
            Some(label) => {
                let text = this.text(&label).await?;
                Ok(SessionState::LoggedIn(text.trim().to_string()))
            }
            None => Ok(SessionState::NotLoggedIn),
        }
    }

    async fn select_tenant(&mut self, value: u32) -> Result<(), UiError> {
        self.execute(&tenant_switch_script(value), Vec::new()).await?;
        Ok(())
    }

    async fn open_record(&mut self, id: &RemoteRecordId) -> Result<(), UiError> {
        let this = &*self;
        this.navigate(&record_url(&this.base_url, id)).await?;
        this.wait_element(&Locator::xpath(selectors::FOLLOW_UP_TAB), "record page")
            .await?;
        Ok(())
    }

    async fn fill_follow_up(&mut self, form: &FollowUpForm) -> Result<(), UiError> {
        let this = &*self;
        let result = this.fill_dialog(form).await;

        // Leave the page in the top-level document whatever happened
        let reset = this.switch_to_frame(None).await;
        match (result, reset) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e.into()),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>, UiError> {
        let value = self.session_command(Method::GET, "/screenshot", None).await?;
        Ok(Some(decode_screenshot(&value)?))
    }

    async fn quit(&mut self) -> Result<(), UiError> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        self.command(Method::DELETE, format!("/session/{}", id), None)
            .await?;
        info!("Browser session {} closed", id);
        Ok(())
    }
}
