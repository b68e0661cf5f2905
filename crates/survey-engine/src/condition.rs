use crate::answers::AnswerValue;
use crate::spec::{Condition, MatchValue};

/// Read access to answers by section id.
///
/// Implemented by the answer store, and by the visibility resolver's view that
/// only exposes answers of sections already known to be visible.
pub trait AnswerLookup {
    fn answer(&self, section_id: &str) -> Option<&AnswerValue>;
}

/// Evaluates one visibility predicate. A missing answer never satisfies it.
pub fn evaluate<A>(condition: &Condition, answers: &A) -> bool
where
    A: AnswerLookup + ?Sized,
{
    match condition {
        Condition::Equals { section_id, value } => answers
            .answer(section_id)
            .is_some_and(|answer| matches_value(answer, value)),
        Condition::LessThan { section_id, value } => answers
            .answer(section_id)
            .and_then(AnswerValue::as_number)
            .is_some_and(|answer| answer < *value),
        Condition::GreaterThan { section_id, value } => answers
            .answer(section_id)
            .and_then(AnswerValue::as_number)
            .is_some_and(|answer| answer > *value),
    }
}

/// Type-aware equality between an answer and a literal.
///
/// Numbers compare numerically, a single choice compares by option id, and a
/// multi-choice answer matches when the literal is among the selected ids.
pub fn matches_value(answer: &AnswerValue, expected: &MatchValue) -> bool {
    match answer {
        AnswerValue::Number(number) => expected.as_f64().is_some_and(|value| value == *number),
        AnswerValue::Choice(id) => option_matches(id, expected),
        AnswerValue::Choices(ids) => ids.iter().any(|id| option_matches(id, expected)),
        AnswerValue::Text(text) => matches!(expected, MatchValue::Text(value) if value == text),
        AnswerValue::Order(_)
        | AnswerValue::Matrix(_)
        | AnswerValue::MultiMatrix(_)
        | AnswerValue::Allocation(_)
        | AnswerValue::Features(_)
        | AnswerValue::Attachment(_)
        | AnswerValue::PersonalInfo(_) => false,
    }
}

fn option_matches(id: &str, expected: &MatchValue) -> bool {
    match expected {
        MatchValue::Text(value) => value == id,
        MatchValue::Number(value) => id.trim().parse::<f64>().is_ok_and(|id| id == *value),
    }
}
