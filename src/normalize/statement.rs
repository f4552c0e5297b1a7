//! Statement normalization.

use serde::Deserialize;

use crate::error::Result;
use crate::format::{parse_brl, parse_brl_plain, parse_iso_date};
use crate::models::{AccountStatement, Direction, Transaction};

/// Carry-forward rows the portal injects between real entries.
const SKIP_DESCRIPTIONS: [&str; 2] = ["SDO CTA/APL AUTOMATICAS", "SALDO DO DIA"];

#[derive(Debug, Deserialize)]
struct StatementPayload {
    #[serde(rename = "lancamentos", default)]
    entries: Vec<EntryPayload>,
    #[serde(rename = "saldoResumido")]
    balance_summary: BalanceSummary,
}

#[derive(Debug, Deserialize)]
struct EntryPayload {
    #[serde(rename = "dataLancamento")]
    date: Option<String>,
    #[serde(rename = "valorLancamento")]
    amount: Option<String>,
    #[serde(rename = "descricaoLancamento")]
    description: Option<String>,
    #[serde(rename = "ePositivo")]
    is_positive: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct BalanceSummary {
    #[serde(rename = "saldoContaCorrente")]
    checking: CheckingBalance,
}

#[derive(Debug, Deserialize)]
struct CheckingBalance {
    #[serde(rename = "valor")]
    value: String,
}

/// Normalize the raw statement payload: drop carry-forward rows and rows
/// with no date or amount, keep portal order for the rest.
pub fn parse(raw: &str) -> Result<AccountStatement> {
    let payload: StatementPayload = serde_json::from_str(raw)?;

    let mut transactions = Vec::new();
    for entry in payload.entries {
        let (Some(date), Some(amount)) = (&entry.date, &entry.amount) else {
            continue;
        };
        if let Some(description) = &entry.description {
            if SKIP_DESCRIPTIONS.contains(&description.as_str()) {
                continue;
            }
        }

        transactions.push(Transaction {
            date: parse_iso_date(date)?,
            description: entry.description.unwrap_or_else(|| "###".to_string()),
            amount: parse_brl(amount)?,
            direction: if entry.is_positive.unwrap_or(false) {
                Direction::Entrada
            } else {
                Direction::Saida
            },
        });
    }

    // The balance arrives without the R$ prefix; only the separators swap.
    let available_balance = parse_brl_plain(&payload.balance_summary.checking.value)?;

    Ok(AccountStatement {
        available_balance,
        transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn payload(entries: &str) -> String {
        format!(
            r#"{{
                "lancamentos": {entries},
                "saldoResumido": {{"saldoContaCorrente": {{"valor": "10.250,75"}}}}
            }}"#
        )
    }

    #[test]
    fn skips_carry_forward_and_null_rows_preserving_order() {
        let raw = payload(
            r#"[
                {"dataLancamento": "2023-07-01", "valorLancamento": "10,00", "descricaoLancamento": "PIX TRANSF", "ePositivo": false},
                {"dataLancamento": "2023-07-01", "valorLancamento": "1,00", "descricaoLancamento": "SALDO DO DIA", "ePositivo": true},
                {"dataLancamento": null, "valorLancamento": "5,00", "descricaoLancamento": "TED", "ePositivo": true},
                {"dataLancamento": "2023-07-02", "valorLancamento": null, "descricaoLancamento": "DOC", "ePositivo": true},
                {"dataLancamento": "2023-07-03", "valorLancamento": "20,00", "descricaoLancamento": "SDO CTA/APL AUTOMATICAS", "ePositivo": true},
                {"dataLancamento": "2023-07-04", "valorLancamento": "30,00", "descricaoLancamento": "PAGAMENTO CONTA", "ePositivo": false}
            ]"#,
        );

        let statement = parse(&raw).unwrap();
        let descriptions: Vec<&str> = statement
            .transactions
            .iter()
            .map(|t| t.description.as_str())
            .collect();
        assert_eq!(descriptions, ["PIX TRANSF", "PAGAMENTO CONTA"]);
    }

    #[test]
    fn maps_positive_flag_to_direction_and_parses_brl_amounts() {
        let raw = payload(
            r#"[
                {"dataLancamento": "2023-07-08", "valorLancamento": "R$ 1.234,56", "descricaoLancamento": "PIX RECEBIDO", "ePositivo": true},
                {"dataLancamento": "2023-07-09", "valorLancamento": "99,90", "descricaoLancamento": "MERCADO", "ePositivo": false}
            ]"#,
        );

        let statement = parse(&raw).unwrap();
        assert_eq!(statement.transactions[0].direction, Direction::Entrada);
        assert_eq!(
            statement.transactions[0].amount,
            Decimal::from_str("1234.56").unwrap()
        );
        assert_eq!(statement.transactions[1].direction, Direction::Saida);
    }

    #[test]
    fn null_description_on_kept_rows_becomes_placeholder() {
        let raw = payload(
            r#"[{"dataLancamento": "2023-07-08", "valorLancamento": "1,00", "descricaoLancamento": null, "ePositivo": true}]"#,
        );

        let statement = parse(&raw).unwrap();
        assert_eq!(statement.transactions[0].description, "###");
    }

    #[test]
    fn balance_uses_the_plain_transform() {
        let statement = parse(&payload("[]")).unwrap();
        assert_eq!(
            statement.available_balance,
            Decimal::from_str("10250.75").unwrap()
        );
    }

    #[test]
    fn missing_balance_is_a_parse_failure() {
        let raw = r#"{"lancamentos": []}"#;
        assert!(matches!(
            parse(raw),
            Err(crate::error::Error::Parse(_))
        ));
    }
}
