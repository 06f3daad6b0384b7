use crate::types::{AttackClass, Rule, RuleOp, StoredBundle};
use serde_json::Value;

/// A bundle matches a class iff every rule is satisfied. Properties missing
/// from the bundle read as `0`; incomparable operand types fail the rule.
pub fn matches(class: &AttackClass, bundle: &StoredBundle) -> bool {
    class.rules.iter().all(|(name, rule)| rule_satisfied(rule, property(bundle, name)))
}

fn rule_satisfied(rule: &Rule, value: Value) -> bool {
    let Rule(op, threshold) = rule;
    match op {
        RuleOp::EQ => values_equal(threshold, &value),
        RuleOp::NE => !values_equal(threshold, &value),
        RuleOp::GT => ordered(threshold, &value, |ord| ord.is_gt()),
        RuleOp::GE => ordered(threshold, &value, |ord| ord.is_ge()),
        RuleOp::LT => ordered(threshold, &value, |ord| ord.is_lt()),
        RuleOp::LE => ordered(threshold, &value, |ord| ord.is_le()),
    }
}

fn values_equal(threshold: &Value, value: &Value) -> bool {
    match (threshold.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => threshold == value,
    }
}

/// Compare `value` against `threshold`; `accept` receives the ordering of
/// value relative to threshold.
fn ordered(
    threshold: &Value,
    value: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    if let (Some(t), Some(v)) = (threshold.as_f64(), value.as_f64()) {
        return v.partial_cmp(&t).map(&accept).unwrap_or(false);
    }
    if let (Some(t), Some(v)) = (threshold.as_str(), value.as_str()) {
        return accept(v.cmp(t));
    }
    false
}

/// The bundle properties visible to rules: the features object plus the
/// valuation columns.
fn property(bundle: &StoredBundle, name: &str) -> Value {
    let features = bundle.features.as_ref();
    match name {
        "innerTxCount" => features.map(|f| f.inner_tx_count).unwrap_or(0).into(),
        "uniswapV2" => features.map(|f| f.uniswap_v2).unwrap_or(0).into(),
        "uniswapV3" => features.map(|f| f.uniswap_v3).unwrap_or(0).into(),
        "pancakeV3" => features.map(|f| f.pancake_v3).unwrap_or(0).into(),
        "mintBurnV3" => features.map(|f| f.mint_burn_v3).unwrap_or(0).into(),
        "mintBurnNFT" => features.map(|f| f.mint_burn_nft).unwrap_or(0).into(),
        "irreducibleTokens" => features.map(|f| f.irreducible_tokens).unwrap_or(0).into(),
        "complexity" => features.and_then(|f| f.complexity).map(Value::from).unwrap_or(0.into()),
        "N_startTokens" => {
            features.and_then(|f| f.n_start_tokens).map(Value::from).unwrap_or(0.into())
        }
        "baseToken" => features
            .and_then(|f| f.base_token)
            .map(|asset| Value::String(asset.to_string()))
            .unwrap_or(Value::Null),
        "startToken" => features
            .and_then(|f| f.start_token)
            .map(|asset| Value::String(asset.to_string()))
            .unwrap_or(Value::Null),
        "bribesRatio" => bundle.bribes_ratio.map(Value::from).unwrap_or(Value::Null),
        "profitEstimation" => bundle.profit_estimation.map(Value::from).unwrap_or(Value::Null),
        "totalCapital" => bundle.total_capital.map(Value::from).unwrap_or(Value::Null),
        "directBribe" => bundle.direct_bribe.into(),
        "gasBurnt" => bundle.gas_burnt.into(),
        "gasOverpay" => bundle.gas_overpay.into(),
        _ => 0.into(),
    }
}
