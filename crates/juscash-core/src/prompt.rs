//! Decision prompt.
//!
//! The template is the single point of control over the generator's output
//! shape. Any edit to [`DECISION_PROMPT`] must bump [`PROMPT_VERSION`]; the
//! version is audit metadata and is never derived from the text.

use crate::policy::RetrievedPassage;

/// Version of [`DECISION_PROMPT`]. Audit metadata.
pub const PROMPT_VERSION: &str = "v1.0.0";

/// Decision instruction template.
///
/// Placeholders: `{policy_context}` and `{process_summary}`.
pub const DECISION_PROMPT: &str = r#"
Você é um assistente jurídico que analisa processos para compra de créditos.

Use APENAS as regras da política abaixo para decidir.

POLÍTICA (trechos relevantes):
{policy_context}

DADOS DO PROCESSO (resumo):
{process_summary}

TAREFA:
- Decida se o processo é "approved", "rejected" ou "incomplete".
- Explique brevemente o motivo em português.
- Liste quais regras (POL-x) usou.

INSTRUÇÕES IMPORTANTES:
- Responda SOMENTE com UM ÚNICO objeto JSON.
- NÃO escreva nada fora do JSON.
- O JSON DEVE TER exatamente estes campos:
  - "decision": uma string, com valor "approved", "rejected" ou "incomplete".
  - "rationale": string com explicação curta dos motivos que utilizou para tomar a decisão em português.
  - "citacoes": lista de strings com IDs das regras, por exemplo ["POL-1","POL-3"].

Agora gere a resposta PARA ESTE PROCESSO ESPECÍFICO.
NÃO repita instruções.
NÃO mostre exemplo.
"#;

/// Render retrieved passages as the policy block of the prompt.
///
/// Each passage becomes `"<id> - <title>\n<body>"`; passages are separated by
/// a blank line and kept in rank order.
pub fn render_policy_context(passages: &[RetrievedPassage]) -> String {
    let mut ordered: Vec<&RetrievedPassage> = passages.iter().collect();
    ordered.sort_by_key(|p| p.rank);

    ordered
        .iter()
        .map(|p| format!("{} - {}\n{}", p.rule.id, p.rule.title, p.rule.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the full decision prompt.
pub fn build_prompt(passages: &[RetrievedPassage], case_summary: &str) -> String {
    let policy_context = render_policy_context(passages);

    // Substituted text is never rescanned, so braces inside a summary or a
    // rule body are never treated as placeholders.
    DECISION_PROMPT
        .split("{policy_context}")
        .map(|chunk| chunk.replace("{process_summary}", case_summary))
        .collect::<Vec<_>>()
        .join(&policy_context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyCorpus, PolicyRule};

    fn passage(id: &str, title: &str, text: &str, rank: usize) -> RetrievedPassage {
        RetrievedPassage {
            rule: PolicyRule {
                id: id.to_string(),
                title: title.to_string(),
                text: text.to_string(),
            },
            rank,
        }
    }

    #[test]
    fn test_policy_context_format() {
        let passages = vec![
            passage("POL-2", "Valor informado", "Informe o valor.", 0),
            passage("POL-4", "Trabalhista", "Não elegível.", 1),
        ];
        assert_eq!(
            render_policy_context(&passages),
            "POL-2 - Valor informado\nInforme o valor.\n\nPOL-4 - Trabalhista\nNão elegível."
        );
    }

    #[test]
    fn test_policy_context_uses_rank_order() {
        let passages = vec![
            passage("POL-4", "Trabalhista", "Não elegível.", 1),
            passage("POL-2", "Valor informado", "Informe o valor.", 0),
        ];
        assert!(render_policy_context(&passages).starts_with("POL-2"));
    }

    #[test]
    fn test_prompt_substitution() {
        let passages = PolicyCorpus::reference().unwrap().passages();
        let prompt = build_prompt(&passages, "Número do processo: 123");

        assert!(prompt.contains("POL-1 - Somente processos transitados"));
        assert!(prompt.contains("POL-8 - Documentos essenciais"));
        assert!(prompt.contains("DADOS DO PROCESSO (resumo):\nNúmero do processo: 123"));
        assert!(!prompt.contains("{policy_context}"));
        assert!(!prompt.contains("{process_summary}"));
    }

    #[test]
    fn test_summary_braces_survive() {
        let passages = vec![passage("POL-1", "T", "B", 0)];
        let prompt = build_prompt(&passages, "Assunto: {policy_context}");
        assert!(prompt.contains("Assunto: {policy_context}"));
        assert!(prompt.contains("POL-1 - T\nB"));
    }

    #[test]
    fn test_rule_braces_survive() {
        let passages = vec![passage("POL-1", "T", "Veja {process_summary}.", 0)];
        let prompt = build_prompt(&passages, "Resumo");
        assert!(prompt.contains("Veja {process_summary}."));
        assert_eq!(prompt.matches("Resumo").count(), 1);
    }

    #[test]
    fn test_template_constrains_output() {
        assert!(DECISION_PROMPT.contains("APENAS as regras da política"));
        assert!(DECISION_PROMPT.contains("UM ÚNICO objeto JSON"));
        assert!(DECISION_PROMPT.contains("\"decision\""));
        assert!(DECISION_PROMPT.contains("\"rationale\""));
        assert!(DECISION_PROMPT.contains("\"citacoes\""));
        assert!(DECISION_PROMPT.contains("NÃO repita instruções"));
        assert!(DECISION_PROMPT.contains("NÃO mostre exemplo"));
    }
}
