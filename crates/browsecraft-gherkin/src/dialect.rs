//! Per-language keyword dictionaries. Plain tables rather than a
//! macro-generated lookup — easy to read, easy to extend with one more
//! language by adding one more match arm.

use crate::ast::KeywordType;

/// One language's keyword spellings. Every list can carry synonyms
/// (Gherkin itself ships several per language); the first entry in each
/// list is the canonical keyword used when re-printing.
#[derive(Debug, Clone)]
pub struct Dialect {
    pub name: &'static str,
    pub feature: &'static [&'static str],
    pub rule: &'static [&'static str],
    pub background: &'static [&'static str],
    pub scenario: &'static [&'static str],
    pub scenario_outline: &'static [&'static str],
    pub examples: &'static [&'static str],
    pub given: &'static [&'static str],
    pub when: &'static [&'static str],
    pub then: &'static [&'static str],
    pub and: &'static [&'static str],
    pub but: &'static [&'static str],
}

const STAR: &str = "* ";

impl Dialect {
    /// Returns `(keyword, KeywordType)` if `line` starts with one of this
    /// dialect's step keywords, including the universal `* `.
    pub fn match_step_keyword<'a>(&self, line: &'a str) -> Option<(&'static str, KeywordType)> {
        if line.starts_with(STAR) {
            return Some(("*", KeywordType::Unknown));
        }
        for (list, kind) in [
            (self.given, KeywordType::Context),
            (self.when, KeywordType::Action),
            (self.then, KeywordType::Outcome),
            (self.and, KeywordType::Conjunction),
            (self.but, KeywordType::Conjunction),
        ] {
            for keyword in list {
                if line.starts_with(keyword) {
                    return Some((keyword, kind));
                }
            }
        }
        None
    }

    pub fn match_section_keyword<'a>(
        &self,
        line: &'a str,
        candidates: &'static [&'static str],
    ) -> Option<&'static str> {
        candidates
            .iter()
            .find(|kw| line.starts_with(**kw) && line[kw.len()..].trim_start().starts_with(':'))
            .copied()
    }
}

const EN: Dialect = Dialect {
    name: "en",
    feature: &["Feature"],
    rule: &["Rule"],
    background: &["Background"],
    scenario: &["Scenario", "Example"],
    scenario_outline: &["Scenario Outline", "Scenario Template"],
    examples: &["Examples", "Scenarios"],
    given: &["Given "],
    when: &["When "],
    then: &["Then "],
    and: &["And "],
    but: &["But "],
};

const EN_LOWERCASE: Dialect = Dialect {
    name: "en-lowercase",
    feature: &["feature"],
    rule: &["rule"],
    background: &["background"],
    scenario: &["scenario", "example"],
    scenario_outline: &["scenario outline", "scenario template"],
    examples: &["examples", "scenarios"],
    given: &["given "],
    when: &["when "],
    then: &["then "],
    and: &["and "],
    but: &["but "],
};

const DE: Dialect = Dialect {
    name: "de",
    feature: &["Funktionalität"],
    rule: &["Regel"],
    background: &["Grundlage"],
    scenario: &["Szenario", "Beispiel"],
    scenario_outline: &["Szenariogrundriss", "Szenario Vorlage"],
    examples: &["Beispiele"],
    given: &["Angenommen ", "Gegeben sei "],
    when: &["Wenn "],
    then: &["Dann "],
    and: &["Und "],
    but: &["Aber "],
};

const FR: Dialect = Dialect {
    name: "fr",
    feature: &["Fonctionnalité"],
    rule: &["Règle"],
    background: &["Contexte"],
    scenario: &["Scénario", "Exemple"],
    scenario_outline: &["Plan du scénario", "Plan du Scénario"],
    examples: &["Exemples"],
    given: &["Soit ", "Etant donné que ", "Étant donné que "],
    when: &["Quand ", "Lorsque "],
    then: &["Alors "],
    and: &["Et "],
    but: &["Mais "],
};

const PT: Dialect = Dialect {
    name: "pt",
    feature: &["Funcionalidade"],
    rule: &["Regra"],
    background: &["Contexto", "Cenário de Fundo"],
    scenario: &["Cenário", "Exemplo"],
    scenario_outline: &["Esquema do Cenário"],
    examples: &["Exemplos", "Cenários"],
    given: &["Dado ", "Dada ", "Dados ", "Dadas "],
    when: &["Quando "],
    then: &["Então ", "Entao "],
    and: &["E "],
    but: &["Mas "],
};

const ES: Dialect = Dialect {
    name: "es",
    feature: &["Característica"],
    rule: &["Regla"],
    background: &["Antecedentes"],
    scenario: &["Escenario", "Ejemplo"],
    scenario_outline: &["Esquema del escenario"],
    examples: &["Ejemplos"],
    given: &["Dado ", "Dada ", "Dados ", "Dadas "],
    when: &["Cuando "],
    then: &["Entonces "],
    and: &["Y ", "E "],
    but: &["Pero "],
};

/// Looks up a dialect by its `# language:` tag. Falls back to `en` for an
/// unrecognized tag rather than failing the parse.
pub fn dialect_for(tag: &str) -> &'static Dialect {
    match tag {
        "en-lowercase" => &EN_LOWERCASE,
        "de" => &DE,
        "fr" => &FR,
        "pt" => &PT,
        "es" => &ES,
        _ => &EN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_tag_falls_back_to_english() {
        assert_eq!(dialect_for("xx").name, "en");
    }

    #[test]
    fn german_given_keyword_matches() {
        let (_kw, kind) = DE.match_step_keyword("Angenommen ich bin angemeldet").unwrap();
        assert_eq!(kind, KeywordType::Context);
    }

    #[test]
    fn star_keyword_is_unknown_type_in_every_dialect() {
        for dialect in [EN, DE, FR, PT, ES] {
            let (kw, kind) = dialect.match_step_keyword("* something happens").unwrap();
            assert_eq!(kw, "*");
            assert_eq!(kind, KeywordType::Unknown);
        }
    }
}
