use crate::{
    keys::normalize_conversation_id,
    metrics_consts::ENRICHED_EVALUATIONS_COUNTER,
    records::{EnrichedEvaluation, Evaluation},
    reducer::NameMapping,
};

/// Attaches a `customer_name` to every evaluation, keeping order and count.
///
/// Evaluations whose conversation isn't in `mapping`, or whose chosen name is empty, get an
/// explicit `None`.
pub fn attach_customer_names(
    evaluations: Vec<Evaluation>,
    mapping: &NameMapping,
) -> Vec<EnrichedEvaluation> {
    let mut matched = 0u64;

    let enriched: Vec<EnrichedEvaluation> = evaluations
        .into_iter()
        .map(|evaluation| {
            let customer_name = evaluation
                .conversation_id
                .as_deref()
                .and_then(normalize_conversation_id)
                .and_then(|id| mapping.get(&id))
                .and_then(|name| name.as_deref())
                .filter(|name| !name.is_empty())
                .map(str::to_owned);

            if customer_name.is_some() {
                matched += 1;
            }

            EnrichedEvaluation {
                evaluation,
                customer_name,
            }
        })
        .collect();

    let unmatched = enriched.len() as u64 - matched;
    metrics::counter!(ENRICHED_EVALUATIONS_COUNTER, "outcome" => "matched").increment(matched);
    metrics::counter!(ENRICHED_EVALUATIONS_COUNTER, "outcome" => "unmatched").increment(unmatched);

    enriched
}
