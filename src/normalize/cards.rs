//! Credit-card normalization.
//!
//! Cards come from two calls: a list response that only matters for its ids,
//! and a detail response carrying names, limits, and invoices.

use serde::Deserialize;

use crate::error::Result;
use crate::format::{parse_brl, parse_iso_date};
use crate::models::{CardLimits, CreditCard, OpenInvoice};

const OPEN_INVOICE_STATUS: &str = "aberta";
const CLOSED_INVOICE_STATUS: &str = "fechada";

#[derive(Debug, Deserialize)]
struct CardListPayload {
    object: CardListObject,
}

#[derive(Debug, Deserialize)]
struct CardListObject {
    #[serde(default)]
    data: Vec<CardRef>,
}

#[derive(Debug, Deserialize)]
struct CardRef {
    id: String,
}

/// Pull the card ids out of the card-list response.
pub fn card_ids(raw: &str) -> Result<Vec<String>> {
    let payload: CardListPayload = serde_json::from_str(raw)?;
    Ok(payload.object.data.into_iter().map(|c| c.id).collect())
}

#[derive(Debug, Deserialize)]
struct CardDetailPayload {
    object: Vec<CardPayload>,
}

#[derive(Debug, Deserialize)]
struct CardPayload {
    id: String,
    #[serde(rename = "nome")]
    name: String,
    #[serde(rename = "numero")]
    number: String,
    #[serde(rename = "vencimento")]
    expiration: String,
    #[serde(rename = "limites", default)]
    limits: Option<LimitsPayload>,
    #[serde(rename = "faturas", default)]
    invoices: Option<Vec<InvoicePayload>>,
}

#[derive(Debug, Deserialize)]
struct LimitsPayload {
    #[serde(rename = "limiteCreditoValor")]
    total: Option<String>,
    #[serde(rename = "limiteCreditoUtilizadoValor")]
    used: Option<String>,
    #[serde(rename = "limiteCreditoDisponivelValor")]
    available: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvoicePayload {
    status: String,
    #[serde(rename = "valorAberto")]
    total: String,
    #[serde(rename = "dataVencimento")]
    due_date: String,
    #[serde(rename = "dataFechamentoFatura")]
    close_date: String,
}

/// Normalize the card-detail response. The invoice shown per card prefers
/// status `aberta` and falls back to `fechada`; a card with neither is
/// dropped, not an error.
pub fn parse(raw: &str) -> Result<Vec<CreditCard>> {
    let payload: CardDetailPayload = serde_json::from_str(raw)?;

    let mut cards = Vec::new();
    for card in payload.object {
        let invoices = card.invoices.unwrap_or_default();
        let selected = invoices
            .iter()
            .find(|i| i.status == OPEN_INVOICE_STATUS)
            .or_else(|| invoices.iter().find(|i| i.status == CLOSED_INVOICE_STATUS));
        let Some(invoice) = selected else {
            continue;
        };

        cards.push(CreditCard {
            expiration_date: parse_iso_date(&card.expiration)?,
            limits: limits_of(card.limits)?,
            open_invoice: OpenInvoice {
                total: parse_brl(&invoice.total)?,
                due_date: parse_iso_date(&invoice.due_date)?,
                close_date: parse_iso_date(&invoice.close_date)?,
            },
            id: card.id,
            name: card.name,
            masked_number: card.number,
        });
    }

    Ok(cards)
}

fn limits_of(payload: Option<LimitsPayload>) -> Result<Option<CardLimits>> {
    let Some(limits) = payload else {
        return Ok(None);
    };
    match (limits.total, limits.used, limits.available) {
        (Some(total), Some(used), Some(available)) => Ok(Some(CardLimits {
            total: parse_brl(&total)?,
            used: parse_brl(&used)?,
            available: parse_brl(&available)?,
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn card_ids_come_from_the_list_response() {
        let raw = r#"{"object": {"data": [{"id": "c-1"}, {"id": "c-2"}]}}"#;
        assert_eq!(card_ids(raw).unwrap(), ["c-1", "c-2"]);
    }

    fn detail_payload(invoices: &str) -> String {
        format!(
            r#"{{"object": [{{
                "id": "c-1",
                "nome": "PLATINUM",
                "numero": "xxxx 1234",
                "vencimento": "2027-05-01",
                "limites": {{
                    "limiteCreditoValor": "10.000,00",
                    "limiteCreditoUtilizadoValor": "1.500,00",
                    "limiteCreditoDisponivelValor": "8.500,00"
                }},
                "faturas": {invoices}
            }}]}}"#
        )
    }

    #[test]
    fn open_invoice_is_preferred() {
        let raw = detail_payload(
            r#"[
                {"status": "fechada", "valorAberto": "100,00", "dataVencimento": "2023-06-10", "dataFechamentoFatura": "2023-06-03"},
                {"status": "aberta", "valorAberto": "250,00", "dataVencimento": "2023-07-10", "dataFechamentoFatura": "2023-07-03"}
            ]"#,
        );

        let cards = parse(&raw).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(
            cards[0].open_invoice.total,
            Decimal::from_str("250.00").unwrap()
        );
    }

    #[test]
    fn closed_invoice_is_the_fallback() {
        let raw = detail_payload(
            r#"[{"status": "fechada", "valorAberto": "100,00", "dataVencimento": "2023-06-10", "dataFechamentoFatura": "2023-06-03"}]"#,
        );

        let cards = parse(&raw).unwrap();
        assert_eq!(cards.len(), 1);
        let invoice = &cards[0].open_invoice;
        assert_eq!(invoice.total, Decimal::from_str("100.00").unwrap());
        assert_eq!(
            invoice.due_date,
            chrono::NaiveDate::from_ymd_opt(2023, 6, 10).unwrap()
        );
    }

    #[test]
    fn cards_without_any_usable_invoice_are_dropped() {
        let with_unknown_status = detail_payload(
            r#"[{"status": "futura", "valorAberto": "1,00", "dataVencimento": "2023-08-10", "dataFechamentoFatura": "2023-08-03"}]"#,
        );
        assert!(parse(&with_unknown_status).unwrap().is_empty());

        let with_no_invoices = detail_payload("[]");
        assert!(parse(&with_no_invoices).unwrap().is_empty());

        let with_null_invoices = detail_payload("null");
        assert!(parse(&with_null_invoices).unwrap().is_empty());
    }

    #[test]
    fn limits_parse_as_a_triple_or_not_at_all() {
        let raw = detail_payload(
            r#"[{"status": "aberta", "valorAberto": "1,00", "dataVencimento": "2023-07-10", "dataFechamentoFatura": "2023-07-03"}]"#,
        );
        let cards = parse(&raw).unwrap();
        let limits = cards[0].limits.as_ref().unwrap();
        assert_eq!(limits.total, Decimal::from_str("10000.00").unwrap());
        assert_eq!(limits.used, Decimal::from_str("1500.00").unwrap());
        assert_eq!(limits.available, Decimal::from_str("8500.00").unwrap());
    }
}
