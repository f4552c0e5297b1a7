//! Investment normalization.
//!
//! The investment service does not return JSON: the payload is a script-like
//! text blob with a JSON array inlined between two fixed sentinels. The
//! closing sentinel swallows the array's final bracket, so extraction puts
//! it back before parsing.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{AssetHolding, InvestmentPosition};

pub const EMBEDDED_JSON_OPEN: &str = "jQuery.parseJSON('";
pub const EMBEDDED_JSON_CLOSE: &str = "]')";

/// Grouping tag for real-estate funds (FIIs).
const REAL_ESTATE_CATEGORY: &str = "investimentosimobiliarios";

const UNKNOWN: &str = "Unknown";

/// Slice the embedded JSON array out of the wrapper text. A missing
/// sentinel is a hard failure, never an empty result.
pub fn extract_embedded_json(text: &str) -> Result<String> {
    let start = text.find(EMBEDDED_JSON_OPEN).ok_or_else(|| {
        Error::MalformedPayload(format!(
            "opening sentinel {EMBEDDED_JSON_OPEN:?} not found in investment response"
        ))
    })?;
    let after = start + EMBEDDED_JSON_OPEN.len();
    let end = text[after..]
        .find(EMBEDDED_JSON_CLOSE)
        .map(|offset| after + offset)
        .ok_or_else(|| {
            Error::MalformedPayload(format!(
                "closing sentinel {EMBEDDED_JSON_CLOSE:?} not found in investment response"
            ))
        })?;

    let mut payload = text[after..end].trim().to_string();
    payload.push(']');
    Ok(payload)
}

#[derive(Debug, Deserialize)]
struct GroupPayload {
    #[serde(rename = "tipoOrdenado", default)]
    category_tag: String,
    #[serde(rename = "valorParaGrafico", default)]
    amount: f64,
    #[serde(rename = "percentualTotal", default)]
    percentage: f64,
    #[serde(rename = "subLista", default)]
    items: Vec<ItemPayload>,
}

#[derive(Debug, Deserialize)]
struct ItemPayload {
    #[serde(rename = "codigoProduto")]
    code: Option<String>,
    #[serde(rename = "nomeProduto")]
    name: Option<String>,
    #[serde(rename = "valorInvestidoGrafico")]
    amount: Option<f64>,
    #[serde(rename = "tipoInvestimento")]
    kind: Option<String>,
}

/// Normalize the investment payload into per-category positions. Absent
/// fields inside a grouping fall back to `Unknown`/`0.0`; only missing
/// sentinels are errors.
pub fn parse(raw: &str) -> Result<Vec<InvestmentPosition>> {
    let payload = extract_embedded_json(raw)?;
    let groups: Vec<GroupPayload> = serde_json::from_str(&payload)?;
    Ok(groups.into_iter().map(position_of).collect())
}

fn position_of(group: GroupPayload) -> InvestmentPosition {
    let category = group
        .items
        .first()
        .and_then(|item| item.kind.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let assets = group
        .items
        .into_iter()
        .map(|item| AssetHolding {
            code: item.code.unwrap_or_else(|| UNKNOWN.to_string()),
            name: item.name.unwrap_or_else(|| UNKNOWN.to_string()),
            amount: item.amount.unwrap_or(0.0),
        })
        .collect();

    InvestmentPosition {
        category_tag: group.category_tag,
        category,
        amount: group.amount,
        percentage: group.percentage,
        assets,
    }
}

/// Flatten the real-estate-fund positions into their individual holdings,
/// largest first.
pub fn real_estate_funds(positions: &[InvestmentPosition]) -> Vec<AssetHolding> {
    let mut assets: Vec<AssetHolding> = positions
        .iter()
        .filter(|position| position.category_tag == REAL_ESTATE_CATEGORY)
        .flat_map(|position| position.assets.iter().cloned())
        .collect();
    assets.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    assets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_finds_the_array_between_sentinels() {
        let blob = r#"noise jQuery.parseJSON('[{"a":1}]') more noise"#;
        let payload = extract_embedded_json(blob).unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value, serde_json::json!([{"a": 1}]));
    }

    #[test]
    fn missing_sentinels_are_malformed_payloads() {
        let missing_close = r#"noise jQuery.parseJSON('[{"a":1}] no close"#;
        assert!(matches!(
            extract_embedded_json(missing_close),
            Err(Error::MalformedPayload(_))
        ));

        let missing_open = r#"[{"a":1}]') tail only"#;
        assert!(matches!(
            extract_embedded_json(missing_open),
            Err(Error::MalformedPayload(_))
        ));
    }

    fn sample_blob() -> String {
        let groups = r#"[
            {
                "tipoOrdenado": "rendafixa",
                "valorParaGrafico": 1000.0,
                "percentualTotal": 40.0,
                "subLista": [
                    {"codigoProduto": "CDB1", "nomeProduto": "CDB DI", "valorInvestidoGrafico": 1000.0, "tipoInvestimento": "Renda Fixa"}
                ]
            },
            {
                "tipoOrdenado": "investimentosimobiliarios",
                "valorParaGrafico": 1500.0,
                "percentualTotal": 60.0,
                "subLista": [
                    {"codigoProduto": "HGLG11", "nomeProduto": "CSHG LOGISTICA", "valorInvestidoGrafico": 500.0, "tipoInvestimento": "Fundos Imobiliários"},
                    {"nomeProduto": "SEM CODIGO", "tipoInvestimento": "Fundos Imobiliários"},
                    {"codigoProduto": "XPML11", "nomeProduto": "XP MALLS", "valorInvestidoGrafico": 1000.0, "tipoInvestimento": "Fundos Imobiliários"}
                ]
            }
        ]"#;
        // The wrapper swallows the final bracket, as the portal does.
        let inline = groups.trim_end().strip_suffix(']').unwrap();
        format!("var x = jQuery.parseJSON('{inline}]') ;")
    }

    #[test]
    fn groups_map_to_positions_with_fallbacks() {
        let positions = parse(&sample_blob()).unwrap();
        assert_eq!(positions.len(), 2);

        assert_eq!(positions[0].category, "Renda Fixa");
        assert_eq!(positions[0].amount, 1000.0);
        assert_eq!(positions[0].percentage, 40.0);

        let fii_assets = &positions[1].assets;
        assert_eq!(fii_assets[1].code, "Unknown");
        assert_eq!(fii_assets[1].amount, 0.0);
    }

    #[test]
    fn real_estate_funds_flatten_and_sort_descending() {
        let positions = parse(&sample_blob()).unwrap();
        let funds = real_estate_funds(&positions);

        let codes: Vec<&str> = funds.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, ["XPML11", "HGLG11", "Unknown"]);
    }
}
