use chrono::{Local, Months, NaiveDate};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::categorizer::TransactionChanges;
use crate::error::{AppError, Result};
use crate::installments::InvoiceSource;
use crate::models::{ApiCategory, CreditCard, Invoice, Tag, Transaction};
use crate::settings::Settings;

/// How far back card invoices are listed when hydrating the installment
/// cache. Wider than the 12-invoice window.
const INVOICE_LOOKBACK_MONTHS: u32 = 24;

#[derive(Debug, Serialize)]
struct UpdatePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<Tag>>,
}

impl<'a> From<&'a TransactionChanges> for UpdatePayload<'a> {
    fn from(changes: &'a TransactionChanges) -> Self {
        Self {
            category_id: changes.category_id,
            description: changes.description.as_deref(),
            notes: changes.notes.as_deref(),
            tags: changes.tags.as_ref().map(|names| {
                names
                    .iter()
                    .map(|name| Tag { name: name.clone() })
                    .collect()
            }),
        }
    }
}

/// Blocking client for the budgeting REST API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: HttpClient,
    email: String,
    token: String,
}

impl Client {
    pub fn new(base_url: &str, email: &str, token: &str, user_agent: &str) -> Result<Self> {
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|err| AppError::Settings(format!("invalid base_url '{base_url}': {err}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| AppError::Settings(format!("invalid user agent: {err}")))?,
        );
        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            base_url,
            http,
            email: email.to_string(),
            token: token.to_string(),
        })
    }

    /// Build a client from settings, with command-line/env overrides taking
    /// precedence over the settings file.
    pub fn from_settings(
        settings: &Settings,
        email: Option<&str>,
        token: Option<&str>,
    ) -> Result<Self> {
        let email = email.unwrap_or(&settings.email);
        if email.is_empty() {
            return Err(AppError::Settings(
                "no account email configured. Set TIDYSPEND_EMAIL or run `tidyspend init`.".into(),
            ));
        }
        let token = token
            .or(settings.api_token.as_deref())
            .filter(|t| !t.is_empty())
            .ok_or(AppError::MissingToken)?;
        let user_agent = Settings {
            email: email.to_string(),
            ..settings.clone()
        }
        .user_agent();
        Self::new(&settings.base_url, email, token, &user_agent)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| AppError::Other(format!("invalid endpoint '{path}': {err}")))
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "GET");
        let res = self
            .http
            .get(url)
            .basic_auth(&self.email, Some(&self.token))
            .query(query)
            .send()?;
        Self::decode(res)
    }

    fn decode<T: DeserializeOwned>(res: Response) -> Result<T> {
        let status = res.status();
        if status.is_success() {
            return Ok(res.json::<T>()?);
        }
        let body = res.text().unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %body, "request failed");
        Err(AppError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    pub fn list_transactions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>> {
        self.get("transactions", &date_range(start, end))
    }

    pub fn list_credit_cards(&self) -> Result<Vec<CreditCard>> {
        self.get("credit_cards", &[])
    }

    pub fn list_invoices(
        &self,
        card_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Invoice>> {
        self.get(
            &format!("credit_cards/{card_id}/invoices"),
            &date_range(start, end),
        )
    }

    /// A single invoice including its transactions.
    pub fn get_invoice(&self, card_id: i64, invoice_id: i64) -> Result<Invoice> {
        self.get(&format!("credit_cards/{card_id}/invoices/{invoice_id}"), &[])
    }

    pub fn list_categories(&self) -> Result<Vec<ApiCategory>> {
        self.get("categories", &[])
    }

    pub fn update_transaction(&self, id: i64, changes: &TransactionChanges) -> Result<Transaction> {
        let url = self.endpoint(&format!("transactions/{id}"))?;
        tracing::debug!(%url, ?changes, "PUT");
        let res = self
            .http
            .put(url)
            .basic_auth(&self.email, Some(&self.token))
            .json(&UpdatePayload::from(changes))
            .send()?;
        Self::decode(res)
    }

    /// Invoices of a card from [`INVOICE_LOOKBACK_MONTHS`] before `anchor`
    /// to a couple of months after it, so open and future invoices are
    /// included.
    pub fn invoices_around(&self, card_id: i64, anchor: NaiveDate) -> Result<Vec<Invoice>> {
        let (start, end) = invoice_range(anchor);
        self.list_invoices(card_id, start, end)
    }

    pub fn recent_invoices(&self, card_id: i64) -> Result<Vec<Invoice>> {
        self.invoices_around(card_id, Local::now().date_naive())
    }
}

impl InvoiceSource for Client {
    fn card_invoices(&self, card_id: i64, anchor: NaiveDate) -> Result<Vec<Invoice>> {
        self.invoices_around(card_id, anchor)
    }

    fn invoice_transactions(&self, card_id: i64, invoice_id: i64) -> Result<Vec<Transaction>> {
        Ok(self.get_invoice(card_id, invoice_id)?.transactions)
    }
}

fn invoice_range(anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = anchor
        .checked_sub_months(Months::new(INVOICE_LOOKBACK_MONTHS))
        .unwrap_or(anchor);
    let end = anchor.checked_add_months(Months::new(2)).unwrap_or(anchor);
    (start, end)
}

fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
    vec![
        ("start_date", start.format("%Y-%m-%d").to_string()),
        ("end_date", end.format("%Y-%m-%d").to_string()),
    ]
}

/// Pull a readable message out of an error body. The API answers with
/// either `{"error": "..."}` or `{"errors": {...}}`.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.get("error")
            .and_then(|e| e.as_str().map(str::to_string))
            .or_else(|| v.get("errors").map(|e| match e.as_str() {
                Some(s) => s.to_string(),
                None => e.to_string(),
            }))
    });
    match message {
        Some(m) => m,
        None if body.trim().is_empty() => "unknown error".to_string(),
        None => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new(
            "https://api.example.com/rest/v2",
            "me@example.com",
            "token",
            "tidyspend (me@example.com)",
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let c = client();
        assert_eq!(
            c.endpoint("transactions").unwrap().as_str(),
            "https://api.example.com/rest/v2/transactions"
        );
        assert_eq!(
            c.endpoint("credit_cards/3/invoices/9").unwrap().as_str(),
            "https://api.example.com/rest/v2/credit_cards/3/invoices/9"
        );
    }

    #[test]
    fn test_trailing_slash_in_base_url() {
        let c = Client::new("https://api.example.com/rest/v2/", "a", "b", "ua").unwrap();
        assert_eq!(
            c.endpoint("categories").unwrap().as_str(),
            "https://api.example.com/rest/v2/categories"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = Client::new("not a url", "a", "b", "ua").unwrap_err();
        assert!(matches!(err, AppError::Settings(_)));
    }

    #[test]
    fn test_from_settings_requires_token() {
        let settings = Settings {
            email: "me@example.com".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            Client::from_settings(&settings, None, None),
            Err(AppError::MissingToken)
        ));
        assert!(Client::from_settings(&settings, None, Some("t")).is_ok());
    }

    #[test]
    fn test_from_settings_requires_email() {
        let settings = Settings {
            api_token: Some("t".to_string()),
            ..Settings::default()
        };
        assert!(matches!(
            Client::from_settings(&settings, None, None),
            Err(AppError::Settings(_))
        ));
        assert!(Client::from_settings(&settings, Some("x@example.com"), None).is_ok());
    }

    #[test]
    fn test_update_payload_only_sends_staged_fields() {
        let changes = TransactionChanges {
            category_id: Some(42),
            tags: Some(vec!["essential".to_string(), "food".to_string()]),
            ..TransactionChanges::default()
        };
        let json = serde_json::to_value(UpdatePayload::from(&changes)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "category_id": 42,
                "tags": [{"name": "essential"}, {"name": "food"}]
            })
        );
    }

    #[test]
    fn test_update_payload_rename() {
        let changes = TransactionChanges {
            description: Some("Uber".to_string()),
            ..TransactionChanges::default()
        };
        let json = serde_json::to_value(UpdatePayload::from(&changes)).unwrap();
        assert_eq!(json, serde_json::json!({"description": "Uber"}));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error": "Not found"}"#), "Not found");
        assert_eq!(
            error_message(r#"{"errors": {"amount_cents": ["is invalid"]}}"#),
            r#"{"amount_cents":["is invalid"]}"#
        );
        assert_eq!(error_message(r#"{"errors": "Unauthorized"}"#), "Unauthorized");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(""), "unknown error");
    }

    #[test]
    fn test_invoice_range_follows_anchor() {
        let anchor = NaiveDate::from_ymd_opt(2023, 5, 10).unwrap();
        assert_eq!(
            invoice_range(anchor),
            (
                NaiveDate::from_ymd_opt(2021, 5, 10).unwrap(),
                NaiveDate::from_ymd_opt(2023, 7, 10).unwrap(),
            )
        );
    }

    #[test]
    fn test_date_range_query() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(
            date_range(start, end),
            vec![
                ("start_date", "2025-01-01".to_string()),
                ("end_date", "2025-01-31".to_string()),
            ]
        );
    }
}
