//! Case summarization.
//!
//! The summary is used twice: as the retrieval query against the policy index
//! and as the case payload inside the decision prompt. Both consumers must see
//! the same text, so rendering is fixed-order and free of anything
//! non-deterministic.

use crate::case::CaseRecord;

/// Render a case record as a labeled plain-text summary.
///
/// Order: case number, class, adjudicating body, sphere, court acronym,
/// award value, secrecy flag, free-justice flag, then the document names and
/// movement descriptions as bulleted lists. An empty list keeps its header.
pub fn summarize(case: &CaseRecord) -> String {
    let mut lines = vec![
        format!("Número do processo: {}", case.case_number),
        format!("Classe: {}", case.class),
        format!("Órgão julgador: {}", case.adjudicating_body),
        format!("Esfera: {}", case.sphere),
        format!("Sigla tribunal: {}", case.court_acronym),
        format!("Valor da condenação: {}", render_amount(case.award_value)),
        format!("Segredo de justiça: {}", render_flag(case.secrecy)),
        format!("Justiça gratuita: {}", render_flag(case.free_justice)),
        String::new(),
        "Nomes dos documentos:".to_string(),
    ];
    lines.extend(case.document_names().map(|name| format!("- {}", name)));

    lines.push(String::new());
    lines.push("Primeiros movimentos registrados:".to_string());
    lines.extend(case.movement_descriptions().map(|desc| format!("- {}", desc)));

    lines.join("\n")
}

fn render_amount(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "não informado".to_string(),
    }
}

fn render_flag(flag: bool) -> &'static str {
    if flag {
        "sim"
    } else {
        "não"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{Document, Movement};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn sample_case() -> CaseRecord {
        CaseRecord {
            case_number: "0001234-56.2023.8.26.0100".to_string(),
            class: "Cumprimento de Sentença".to_string(),
            adjudicating_body: "1ª Vara Cível".to_string(),
            distributed_at: Utc.with_ymd_and_hms(2024, 11, 18, 23, 15, 44).unwrap(),
            claim_value: Some(20000.0),
            subject: Some("Danos morais".to_string()),
            secrecy: false,
            free_justice: true,
            court_acronym: "TJSP".to_string(),
            sphere: "Cível".to_string(),
            award_value: Some(15000.0),
            documents: vec![Document {
                id: "DOC-1".to_string(),
                filed_at: Utc.with_ymd_and_hms(2024, 10, 1, 10, 0, 0).unwrap(),
                name: "Certidão de trânsito em julgado".to_string(),
                text: "Certifico o trânsito em julgado.".to_string(),
            }],
            movements: vec![
                Movement {
                    timestamp: Utc.with_ymd_and_hms(2024, 10, 2, 9, 0, 0).unwrap(),
                    description: "Iniciado cumprimento de sentença".to_string(),
                },
                Movement {
                    timestamp: Utc.with_ymd_and_hms(2024, 10, 3, 9, 0, 0).unwrap(),
                    description: "Expedido ofício requisitório".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_summary_layout() {
        let summary = summarize(&sample_case());
        let expected = "\
Número do processo: 0001234-56.2023.8.26.0100
Classe: Cumprimento de Sentença
Órgão julgador: 1ª Vara Cível
Esfera: Cível
Sigla tribunal: TJSP
Valor da condenação: 15000.00
Segredo de justiça: não
Justiça gratuita: sim

Nomes dos documentos:
- Certidão de trânsito em julgado

Primeiros movimentos registrados:
- Iniciado cumprimento de sentença
- Expedido ofício requisitório";
        assert_eq!(summary, expected);
    }

    #[test]
    fn test_empty_lists_keep_headers() {
        let mut case = sample_case();
        case.documents.clear();
        case.movements.clear();
        case.award_value = None;

        let summary = summarize(&case);
        assert!(summary.contains("Valor da condenação: não informado"));
        assert!(summary.ends_with("Nomes dos documentos:\n\nPrimeiros movimentos registrados:"));
        assert!(!summary.contains("\n- "));
    }

    #[test]
    fn test_fields_outside_summary_are_ignored() {
        let mut other = sample_case();
        other.claim_value = None;
        other.subject = None;
        assert_eq!(summarize(&sample_case()), summarize(&other));
    }

    proptest! {
        #[test]
        fn prop_summary_is_deterministic(
            number in "[0-9.-]{1,25}",
            sphere in "\\PC{0,20}",
            award in proptest::option::of(0.0f64..1.0e9),
            names in proptest::collection::vec("\\PC{0,30}", 0..5),
        ) {
            let mut case = sample_case();
            case.case_number = number;
            case.sphere = sphere;
            case.award_value = award;
            case.documents = names
                .into_iter()
                .enumerate()
                .map(|(i, name)| Document {
                    id: format!("DOC-{}", i),
                    filed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    name,
                    text: String::new(),
                })
                .collect();

            let first = summarize(&case);
            let second = summarize(&case.clone());
            prop_assert_eq!(first, second);
        }
    }
}
