//! Adaptive Quiz Generator
//!
//! Selection pipeline:
//! 1. restrict the bank to the optional topic filter
//! 2. exclude recently answered questions, re-admitting the least recently
//!    answered ones only while the pool is smaller than the request
//! 3. split the request over difficulty tiers (30/50/20), moving shortfalls
//!    to adjacent tiers first
//! 4. sample each tier weighted towards weak topics, then shuffle
//!
//! The RNG is injected so callers (and tests) control reproducibility.

use std::collections::{BTreeMap, HashSet};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::performance::topic_tallies;
use crate::types::{AttemptRecord, Difficulty, Question, QuestionBank, Tally};

// ==================== Constants ====================

/// Accuracy below which a topic counts as weak
pub const DEFAULT_WEAK_THRESHOLD: f64 = 0.7;

/// Sampling weight of a weak-topic question (neutral questions weigh 1.0)
pub const DEFAULT_WEAK_TOPIC_WEIGHT: f64 = 3.0;

pub const DEFAULT_QUIZ_SIZE: usize = 20;

pub const MAX_QUIZ_SIZE: usize = 50;

/// Target share per tier in percent: easy, medium, hard
pub const DIFFICULTY_MIX_PERCENT: [usize; 3] = [30, 50, 20];

/// Where a tier's shortfall goes first, by tier index
const ADJACENT_TIERS: [&[usize]; 3] = [&[1], &[0, 2], &[1]];

/// Fallback order for leftovers once adjacent tiers are exhausted
const FALLBACK_TIERS: [usize; 3] = [1, 0, 2];

// ==================== Config ====================

/// How far back answered questions are kept out of a new quiz.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyWindow {
    /// The attempts of the most recent quiz
    #[default]
    LastQuiz,
    /// The last `n` attempts
    Attempts(usize),
}

impl RecencyWindow {
    /// Parses `last_quiz` or an attempt count.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("last_quiz") {
            return Some(RecencyWindow::LastQuiz);
        }
        raw.parse::<usize>().ok().map(RecencyWindow::Attempts)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizConfig {
    pub weak_threshold: f64,
    pub weak_topic_weight: f64,
    pub recency: RecencyWindow,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            weak_threshold: DEFAULT_WEAK_THRESHOLD,
            weak_topic_weight: DEFAULT_WEAK_TOPIC_WEIGHT,
            recency: RecencyWindow::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuizRequest {
    pub count: usize,
    /// Restrict the pool to these topics (case-insensitive)
    #[serde(default)]
    pub topic_filter: Option<Vec<String>>,
}

impl QuizRequest {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            topic_filter: None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum QuizError {
    #[error("question count must be between 1 and {max}, got {requested}")]
    InvalidCount { requested: usize, max: usize },
    #[error("invalid quiz config: {0}")]
    InvalidConfig(&'static str),
}

// ==================== Result Types ====================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TierCount {
    pub target: usize,
    pub selected: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DifficultyDistribution {
    pub easy: TierCount,
    pub medium: TierCount,
    pub hard: TierCount,
}

impl DifficultyDistribution {
    fn tier_mut(&mut self, tier: usize) -> &mut TierCount {
        match tier {
            0 => &mut self.easy,
            1 => &mut self.medium,
            _ => &mut self.hard,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuizSelection {
    /// Presentation order
    pub question_ids: Vec<String>,
    pub requested: usize,
    /// Fewer eligible questions existed than requested
    pub partial: bool,
    pub distribution: DifficultyDistribution,
    /// Weak topics present in the pool, weakest first
    pub weak_topics: Vec<String>,
    /// Recently answered questions re-admitted to fill the quiz
    pub relaxed_exclusions: usize,
    /// Recently answered questions still kept out
    pub excluded_recent: usize,
}

// ==================== Generation ====================

pub fn quiz_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Build an adaptive quiz from the bank for a user with `history`
/// (chronological, oldest first).
pub fn generate_quiz<R: Rng + ?Sized>(
    bank: &QuestionBank,
    history: &[AttemptRecord],
    request: &QuizRequest,
    config: &QuizConfig,
    rng: &mut R,
) -> Result<QuizSelection, QuizError> {
    if request.count == 0 || request.count > MAX_QUIZ_SIZE {
        return Err(QuizError::InvalidCount {
            requested: request.count,
            max: MAX_QUIZ_SIZE,
        });
    }
    if !(config.weak_topic_weight.is_finite() && config.weak_topic_weight > 0.0) {
        return Err(QuizError::InvalidConfig("weak_topic_weight must be positive"));
    }

    let pool: Vec<&Question> = bank
        .questions()
        .iter()
        .filter(|q| matches_filter(q, request.topic_filter.as_deref()))
        .collect();

    let recent = recent_question_ids(history, config.recency);
    let (eligible, relaxed, still_excluded) = apply_recency(&pool, &recent, request.count);

    let tallies = topic_tallies(history, bank);
    let weak_topics = weak_topics_in_pool(&pool, &tallies, config.weak_threshold);

    let mut tiers: [Vec<&Question>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for question in eligible {
        tiers[question.difficulty.index()].push(question);
    }
    let available = [tiers[0].len(), tiers[1].len(), tiers[2].len()];
    let targets = tier_targets(request.count);
    let partial = available.iter().sum::<usize>() < request.count;
    let allocation = if partial {
        available
    } else {
        allocate(targets, available)
    };

    let weak: HashSet<&str> = weak_topics.iter().map(String::as_str).collect();
    let mut distribution = DifficultyDistribution::default();
    let mut question_ids = Vec::with_capacity(request.count);

    for difficulty in Difficulty::ALL {
        let tier = difficulty.index();
        let take = allocation[tier];
        let slot = distribution.tier_mut(tier);
        slot.target = targets[tier];
        slot.selected = take;
        if take == 0 {
            continue;
        }
        let chosen = tiers[tier]
            .choose_multiple_weighted(rng, take, |q| {
                if weak.contains(q.topic.as_str()) {
                    config.weak_topic_weight
                } else {
                    1.0
                }
            })
            .map_err(|_| QuizError::InvalidConfig("question weights"))?;
        question_ids.extend(chosen.map(|q| q.question_id.clone()));
    }

    question_ids.shuffle(rng);

    Ok(QuizSelection {
        question_ids,
        requested: request.count,
        partial,
        distribution,
        weak_topics,
        relaxed_exclusions: relaxed,
        excluded_recent: still_excluded,
    })
}

fn matches_filter(question: &Question, filter: Option<&[String]>) -> bool {
    match filter {
        None => true,
        Some([]) => true,
        Some(topics) => topics
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(&question.topic)),
    }
}

/// Question ids inside the recency window, most recent first, deduplicated.
pub fn recent_question_ids(history: &[AttemptRecord], window: RecencyWindow) -> Vec<String> {
    let span = match window {
        RecencyWindow::Attempts(n) => n.min(history.len()),
        RecencyWindow::LastQuiz => match history.last() {
            None => 0,
            Some(last) => history
                .iter()
                .rev()
                .take_while(|a| a.quiz_id == last.quiz_id)
                .count(),
        },
    };

    let mut seen = HashSet::new();
    history
        .iter()
        .rev()
        .take(span)
        .filter(|a| seen.insert(a.question_id.as_str()))
        .map(|a| a.question_id.clone())
        .collect()
}

/// Returns (eligible questions, re-admitted count, still excluded count).
fn apply_recency<'q>(
    pool: &[&'q Question],
    recent_most_first: &[String],
    wanted: usize,
) -> (Vec<&'q Question>, usize, usize) {
    let in_pool: HashSet<&str> = pool.iter().map(|q| q.question_id.as_str()).collect();
    let mut excluded: Vec<&str> = recent_most_first
        .iter()
        .map(String::as_str)
        .filter(|id| in_pool.contains(id))
        .collect();

    let mut fresh = pool.len() - excluded.len();
    let mut relaxed = 0;
    // Least recently answered sits at the back.
    while fresh < wanted && !excluded.is_empty() {
        excluded.pop();
        fresh += 1;
        relaxed += 1;
    }

    let blocked: HashSet<&str> = excluded.iter().copied().collect();
    let eligible = pool
        .iter()
        .copied()
        .filter(|q| !blocked.contains(q.question_id.as_str()))
        .collect();
    (eligible, relaxed, blocked.len())
}

fn weak_topics_in_pool(
    pool: &[&Question],
    tallies: &BTreeMap<String, Tally>,
    threshold: f64,
) -> Vec<String> {
    let pool_topics: HashSet<&str> = pool.iter().map(|q| q.topic.as_str()).collect();
    let mut weak: Vec<(String, f64)> = tallies
        .iter()
        .filter(|(topic, _)| pool_topics.contains(topic.as_str()))
        .filter_map(|(topic, tally)| tally.accuracy().map(|acc| (topic.clone(), acc)))
        .filter(|(_, acc)| *acc < threshold)
        .collect();
    weak.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    weak.into_iter().map(|(topic, _)| topic).collect()
}

/// Largest-remainder split of `count` over the fixed mix; ties favour medium.
pub fn tier_targets(count: usize) -> [usize; 3] {
    let mut targets = [0usize; 3];
    let mut remainders = [(0usize, 0usize); 3];
    for tier in 0..3 {
        let scaled = count * DIFFICULTY_MIX_PERCENT[tier];
        targets[tier] = scaled / 100;
        remainders[tier] = (scaled % 100, tier);
    }
    let mut leftover = count - targets.iter().sum::<usize>();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| fallback_rank(a.1).cmp(&fallback_rank(b.1))));
    for (_, tier) in remainders {
        if leftover == 0 {
            break;
        }
        targets[tier] += 1;
        leftover -= 1;
    }
    targets
}

fn fallback_rank(tier: usize) -> usize {
    FALLBACK_TIERS.iter().position(|&t| t == tier).unwrap_or(tier)
}

/// Caps each tier at what is available, pushing shortfalls to adjacent
/// tiers, then to any tier with spare questions.
fn allocate(targets: [usize; 3], available: [usize; 3]) -> [usize; 3] {
    let mut alloc = targets;
    let mut overflow = 0usize;

    for tier in 0..3 {
        if alloc[tier] <= available[tier] {
            continue;
        }
        let mut short = alloc[tier] - available[tier];
        alloc[tier] = available[tier];
        for &next in ADJACENT_TIERS[tier] {
            let spare = available[next].saturating_sub(alloc[next]);
            let give = short.min(spare);
            alloc[next] += give;
            short -= give;
        }
        overflow += short;
    }

    for tier in FALLBACK_TIERS {
        if overflow == 0 {
            break;
        }
        let spare = available[tier].saturating_sub(alloc[tier]);
        let give = overflow.min(spare);
        alloc[tier] += give;
        overflow -= give;
    }
    alloc
}
