//! Built-in detectors for Brazilian personal data.

use lgpd_core::PiiCategory;

use super::{Normalizer, PatternDef, Validator};

const EMAIL: &str = r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b";

// (DD) DDDD-DDDD and (DD) 9DDDD-DDDD with optional +55. The leading \b keeps
// it off digit runs inside longer numbers such as card groups.
const PHONE: &str = r"(?:\+55[\s-]?)?\(?\b\d{2}\)?[\s-]?9?\d{4}[\s-]?\d{4}\b";

const CPF: &str = r"\b\d{3}\.?\d{3}\.?\d{3}-?\d{2}\b";

const RG: &str = r"\b\d{2}\.\d{3}\.\d{3}-?[\dXx]\b";

const CREDIT_CARD: &str = r"\b\d{4}(?:[\s-]?\d{4}){2}[\s-]?\d{1,7}\b";

// Best effort. Two or more capitalised words, allowing the usual
// lowercase particles between them.
const NAME: &str =
    r"\b\p{Lu}\p{Ll}+(?:[ \t]+(?:(?:da|de|do|das|dos|e)[ \t]+)?\p{Lu}\p{Ll}+)+\b";

fn samples(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Built-in definitions in detector order.
pub fn definitions() -> Vec<PatternDef> {
    vec![
        PatternDef {
            id: "email".to_string(),
            category: PiiCategory::Email,
            pattern: EMAIL.to_string(),
            validator: None,
            normalizer: Normalizer::Lowercase,
            must_match: samples(&["jane@example.com", "contato: joao.silva+lgpd@empresa.com.br"]),
            must_not_match: samples(&["jane@", "@example.com", "plain text"]),
        },
        PatternDef {
            id: "phone".to_string(),
            category: PiiCategory::Phone,
            pattern: PHONE.to_string(),
            validator: None,
            normalizer: Normalizer::DigitsOnly,
            must_match: samples(&["(11) 98765-4321", "+55 21 3456-7890", "ligue 11 3456 7890"]),
            must_not_match: samples(&["4111 1111 1111 1111", "CEP 01310-100", "12345"]),
        },
        PatternDef {
            id: "cpf".to_string(),
            category: PiiCategory::NationalId,
            pattern: CPF.to_string(),
            validator: Some(Validator::Cpf),
            normalizer: Normalizer::DigitsOnly,
            must_match: samples(&["123.456.789-09", "CPF 529.982.247-25"]),
            must_not_match: samples(&["123.456.789-00", "111.111.111-11", "4111111111111111"]),
        },
        PatternDef {
            id: "rg".to_string(),
            category: PiiCategory::NationalId,
            pattern: RG.to_string(),
            validator: None,
            normalizer: Normalizer::Verbatim,
            must_match: samples(&["RG 12.345.678-9", "12.345.678-X"]),
            must_not_match: samples(&["123.456.789-09", "12345678"]),
        },
        PatternDef {
            id: "credit_card".to_string(),
            category: PiiCategory::CreditCard,
            pattern: CREDIT_CARD.to_string(),
            validator: Some(Validator::Luhn),
            normalizer: Normalizer::DigitsOnly,
            must_match: samples(&[
                "4111 1111 1111 1111",
                "card: 5500-0000-0000-0004",
                "4111111111111111",
            ]),
            must_not_match: samples(&["1234 5678 9012 3456", "4111 1111"]),
        },
        PatternDef {
            id: "name".to_string(),
            category: PiiCategory::Name,
            pattern: NAME.to_string(),
            validator: None,
            normalizer: Normalizer::CollapseWhitespace,
            must_match: samples(&["Maria da Silva", "cliente: João Pereira"]),
            must_not_match: samples(&["maria silva", "Silva", "ACME CORP", "jane@example.com"]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternLibrary;

    #[test]
    fn builtins_pass_their_samples() {
        let lib = PatternLibrary::builtin().unwrap();
        let ids: Vec<&str> = lib.detectors().iter().map(|d| d.id()).collect();
        assert_eq!(ids, ["email", "phone", "cpf", "rg", "credit_card", "name"]);
    }

    #[test]
    fn email_is_case_insensitive_and_rejects_pipe() {
        let lib = PatternLibrary::builtin().unwrap();
        let found = lib.find_all("Write to JANE@EXAMPLE.COM or a@b.c|m");
        let emails: Vec<_> = found
            .iter()
            .filter(|m| m.category == PiiCategory::Email)
            .map(|m| m.normalized.as_str())
            .collect();
        assert_eq!(emails, ["jane@example.com"]);
    }

    #[test]
    fn phone_does_not_fire_inside_card() {
        let lib = PatternLibrary::builtin().unwrap();
        let found = lib.find_all("4111 1111 1111 1111");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, PiiCategory::CreditCard);
        assert_eq!(found[0].normalized, "4111111111111111");
    }
}
