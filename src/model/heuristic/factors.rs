//! Additive factors
//!
//! Each factor is a pure function of the features and the parameter set and
//! returns `None` when it has nothing to say. Their sum is order-independent.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::features::{HeuristicFeatures, ValuationTier};
use crate::model::params::HeuristicParameters;
use crate::signals::{DollarStrength, GdpSentiment, GuidanceChange, SurpriseKind};
use crate::types::{FilingEventKind, FilingType, MarketCapTier, MarketRegime, ReasoningEntry};

pub type Factor = fn(&HeuristicFeatures, &HeuristicParameters) -> Option<ReasoningEntry>;

/// Every additive factor, in trace order
pub const ADDITIVE_FACTORS: &[Factor] = &[
    filing_type,
    risk_delta,
    sentiment,
    concern_level,
    earnings_surprise,
    revenue_surprise,
    guidance_change,
    market_cap_curve,
    flight_to_quality,
    dollar_flow,
    gdp_sentiment,
    analyst_actions,
    analyst_consensus,
    price_target_upside,
    historical_pattern,
];

fn entry(factor: &str, impact: Decimal, explanation: String) -> Option<ReasoningEntry> {
    if impact.is_zero() {
        None
    } else {
        Some(ReasoningEntry::new(factor, impact, explanation))
    }
}

pub fn filing_type(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let t = &p.filing_type;
    let (impact, label) = match (f.filing_type, f.event_kind) {
        (FilingType::TenK, _) => (t.annual, "Annual report (10-K)"),
        (FilingType::TenQ, _) => (t.quarterly, "Quarterly report (10-Q)"),
        (FilingType::EightK, Some(FilingEventKind::EarningsWithFinancials)) => (
            t.earnings_with_financials,
            "8-K earnings release with financial statements",
        ),
        (FilingType::EightK, Some(FilingEventKind::EarningsAnnouncement)) => {
            (t.earnings_announcement, "8-K earnings announcement")
        }
        (FilingType::EightK, _) => (t.material_event, "8-K material event"),
        (FilingType::Other, _) => (t.other, "Other filing"),
    };
    entry("filing_type", impact, label.to_string())
}

pub fn risk_delta(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let impact = -f.risk_score_delta * p.risk_weight;
    let direction = if f.risk_score_delta > Decimal::ZERO { "rose" } else { "fell" };
    entry(
        "risk_delta",
        impact,
        format!("Risk score {} by {:.1} points", direction, f.risk_score_delta.abs()),
    )
}

/// Tone, damped under elevated concern and inverted under high concern
pub fn sentiment(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let s = f.sentiment_score;
    let c = f.concern_level;
    let cp = &p.concern;
    let raw = s * p.sentiment_weight;

    let (impact, explanation) = if s > Decimal::ZERO && f.coverage.concern && c >= cp.high_threshold {
        (
            -raw * cp.inversion_factor,
            format!(
                "Tone/concern misalignment: optimistic tone ({:.2}) despite high concern ({:.1}/10) read as a credibility red flag",
                s, c
            ),
        )
    } else if s > Decimal::ZERO && f.coverage.concern && c >= cp.elevated_threshold {
        (
            raw * cp.elevated_damping,
            format!("Positive tone ({:.2}) damped by elevated concern ({:.1}/10)", s, c),
        )
    } else {
        let tone = if s >= Decimal::ZERO { "Positive" } else { "Negative" };
        (raw, format!("{} filing tone ({:.2})", tone, s))
    };
    entry("sentiment", impact, explanation)
}

/// Centered on the midpoint of the 0-10 concern scale
pub fn concern_level(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    if !f.coverage.concern {
        return None;
    }
    let impact = (p.concern.midpoint - f.concern_level) * p.concern.centered_weight;
    let label = if f.concern_level > p.concern.midpoint { "Elevated" } else { "Low" };
    entry(
        "concern_level",
        impact,
        format!("{} concern level ({:.1}/10)", label, f.concern_level),
    )
}

pub fn valuation_multiplier(tier: ValuationTier, p: &HeuristicParameters) -> Decimal {
    let v = &p.valuation;
    match tier {
        ValuationTier::Value => v.value,
        ValuationTier::Fair => v.fair,
        ValuationTier::Growth => v.growth,
        ValuationTier::Premium => v.premium,
        ValuationTier::Unknown => v.unknown,
    }
}

pub fn liquidity_multiplier(tier: MarketCapTier, p: &HeuristicParameters) -> Decimal {
    let l = &p.liquidity;
    match tier {
        MarketCapTier::Small => l.small,
        MarketCapTier::Mid => l.mid,
        MarketCapTier::Large => l.large,
        MarketCapTier::Mega => l.mega,
        MarketCapTier::Unknown => l.unknown,
    }
}

pub fn earnings_surprise(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let kind = f.eps?;
    let e = &p.earnings;
    let pct = f.eps_surprise_pct;
    let (base, label) = match kind {
        SurpriseKind::Beat if pct > e.large_threshold_pct => {
            (e.beat + e.large_beat_bonus, format!("Large EPS beat of {:+.1}%", pct))
        }
        SurpriseKind::Beat => (e.beat, format!("EPS beat of {:+.1}%", pct)),
        SurpriseKind::Miss if pct < -e.large_threshold_pct => {
            (e.miss + e.large_miss_penalty, format!("Large EPS miss of {:+.1}%", pct))
        }
        SurpriseKind::Miss => (e.miss, format!("EPS miss of {:+.1}%", pct)),
        SurpriseKind::Inline => (e.inline, "EPS in line with consensus".to_string()),
    };
    let valuation = valuation_multiplier(f.valuation, p);
    let liquidity = liquidity_multiplier(f.cap_tier, p);
    entry(
        "earnings_surprise",
        base * valuation * liquidity,
        format!("{} (x{} valuation, x{} liquidity)", label, valuation, liquidity),
    )
}

pub fn revenue_surprise(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    match f.revenue? {
        SurpriseKind::Beat => entry("revenue_surprise", p.earnings.revenue_beat, "Revenue beat".to_string()),
        SurpriseKind::Miss => entry("revenue_surprise", p.earnings.revenue_miss, "Revenue miss".to_string()),
        SurpriseKind::Inline => None,
    }
}

pub fn guidance_change(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let g = &p.guidance;
    let (impact, explanation) = match f.guidance? {
        GuidanceChange::Raised => (g.raised, "Guidance raised"),
        GuidanceChange::Lowered => (g.lowered, "Guidance lowered"),
        GuidanceChange::Initiated => (g.initiated, "Guidance newly issued"),
        GuidanceChange::Maintained => (g.maintained, "Guidance maintained"),
    };
    entry("guidance", impact, explanation.to_string())
}

/// Non-monotonic: penalised below the sweet spot, rewarded most inside it
pub fn market_cap_curve(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    if f.cap_tier == MarketCapTier::Unknown {
        return None;
    }
    let s = &p.size_curve;
    let cap = f.market_cap_usd;
    let billions = cap / dec!(1_000_000_000);
    let (impact, explanation) = if cap < s.sweet_spot_low_usd {
        (s.below_sweet_spot, format!("${:.0}B sits below the size sweet spot", billions))
    } else if cap < s.sweet_spot_high_usd {
        let bonus = if f.regime == MarketRegime::Bull {
            s.sweet_spot_bull_bonus
        } else {
            Decimal::ZERO
        };
        (s.sweet_spot + bonus, format!("${:.0}B in the size sweet spot", billions))
    } else if cap < s.mega_usd {
        (s.upper, format!("${:.0}B large cap", billions))
    } else {
        (s.mega, format!("${:.0}B mega cap with institutional support", billions))
    };
    entry("market_cap", impact, explanation)
}

pub fn flight_to_quality(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    if !f.volatility_elevated {
        return None;
    }
    let shift = p.macro_flow.flight_to_quality;
    match f.cap_tier {
        MarketCapTier::Large | MarketCapTier::Mega => entry(
            "flight_to_quality",
            shift,
            "Elevated volatility favours large caps".to_string(),
        ),
        MarketCapTier::Small | MarketCapTier::Mid => entry(
            "flight_to_quality",
            -shift,
            "Elevated volatility weighs on smaller caps".to_string(),
        ),
        MarketCapTier::Unknown => None,
    }
}

pub fn dollar_flow(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    match f.dollar {
        DollarStrength::Weak => entry("dollar", p.macro_flow.weak_dollar, "Weak dollar tailwind".to_string()),
        DollarStrength::Strong => {
            entry("dollar", p.macro_flow.strong_dollar, "Strong dollar headwind".to_string())
        }
        DollarStrength::Neutral => None,
    }
}

pub fn gdp_sentiment(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    match f.gdp {
        GdpSentiment::Expanding => entry("gdp", p.macro_flow.expanding, "Expanding economy".to_string()),
        GdpSentiment::Contracting => {
            entry("gdp", p.macro_flow.contracting, "Contracting economy".to_string())
        }
        GdpSentiment::Stable => None,
    }
}

/// Major-firm actions weigh double; each direction capped on its own
pub fn analyst_actions(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let a = &p.analysts;
    let count = |n: u32| Decimal::from(n);
    let up = (count(f.upgrades.saturating_sub(f.major_upgrades)) * a.upgrade
        + count(f.major_upgrades) * a.major_upgrade)
        .min(a.upgrade_cap);
    let down = (count(f.downgrades.saturating_sub(f.major_downgrades)) * a.downgrade
        + count(f.major_downgrades) * a.major_downgrade)
        .min(a.downgrade_cap);
    entry(
        "analyst_actions",
        up - down,
        format!(
            "{} upgrades ({} major), {} downgrades ({} major) in 30 days",
            f.upgrades, f.major_upgrades, f.downgrades, f.major_downgrades
        ),
    )
}

pub fn analyst_consensus(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let a = &p.analysts;
    let c = f.consensus_score;
    let (impact, label) = if c <= a.strong_buy_threshold {
        (a.strong_buy, "Strong buy")
    } else if c <= a.buy_threshold {
        (a.buy, "Buy")
    } else if c >= a.sell_threshold {
        (a.sell, "Sell-side bearish")
    } else {
        return None;
    };
    entry("consensus", impact, format!("{} consensus ({:.1})", label, c))
}

pub fn price_target_upside(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let a = &p.analysts;
    let impact = (f.upside_to_target_pct * a.upside_per_pct)
        .max(-a.upside_cap)
        .min(a.upside_cap);
    entry(
        "price_target",
        impact,
        format!("{:+.1}% to analyst target", f.upside_to_target_pct),
    )
}

/// Ticker history when there is enough of it, else the generic average
pub fn historical_pattern(f: &HeuristicFeatures, p: &HeuristicParameters) -> Option<ReasoningEntry> {
    let h = &p.history;
    if f.coverage.ticker_history && f.ticker_sample_count >= h.min_ticker_samples {
        entry(
            "history",
            f.ticker_mean_return_pct * h.ticker_weight,
            format!(
                "Ticker averaged {:+.2}% over {} past filings",
                f.ticker_mean_return_pct, f.ticker_sample_count
            ),
        )
    } else {
        entry(
            "history",
            f.generic_mean_return_pct * h.generic_weight,
            format!("Generic filing reaction {:+.2}%", f.generic_mean_return_pct),
        )
    }
}
