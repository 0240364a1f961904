use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use prepcoach_algo::quiz::{DEFAULT_QUIZ_SIZE, MAX_QUIZ_SIZE};
use prepcoach_algo::{AggregatorConfig, QuizConfig, RecencyWindow};

/// Knobs of the study decision logic.
#[derive(Debug, Clone)]
pub struct StudySettings {
    pub aggregator: AggregatorConfig,
    pub quiz: QuizConfig,
    pub default_quiz_size: usize,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            quiz: QuizConfig::default(),
            default_quiz_size: DEFAULT_QUIZ_SIZE,
        }
    }
}

impl StudySettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let recent_window = env_parse("RECENT_WINDOW", defaults.aggregator.recent_window, |v| *v > 0);
        let weak_threshold = env_parse("WEAK_TOPIC_THRESHOLD", defaults.quiz.weak_threshold, |v| {
            (0.0..=1.0).contains(v)
        });
        let weak_topic_weight =
            env_parse("WEAK_TOPIC_WEIGHT", defaults.quiz.weak_topic_weight, |v| {
                v.is_finite() && *v > 0.0
            });
        let recency = match env_string("RECENCY_WINDOW") {
            None => defaults.quiz.recency,
            Some(raw) => RecencyWindow::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(key = "RECENCY_WINDOW", value = %raw, "invalid value, using default");
                defaults.quiz.recency
            }),
        };
        let default_quiz_size = env_parse("DEFAULT_QUIZ_SIZE", defaults.default_quiz_size, |v| {
            (1..=MAX_QUIZ_SIZE).contains(v)
        });

        Self {
            aggregator: AggregatorConfig { recent_window },
            quiz: QuizConfig {
                weak_threshold,
                weak_topic_weight,
                recency,
            },
            default_quiz_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub question_bank_path: Option<PathBuf>,
    pub seed_demo_data: bool,
    pub study: StudySettings,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let question_bank_path = env_string("QUESTION_BANK_PATH").map(PathBuf::from);
        let seed_demo_data = env_bool("SEED_DEMO_DATA").unwrap_or(true);

        Self {
            host,
            port,
            question_bank_path,
            seed_demo_data,
            study: StudySettings::from_env(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let value = env_string(key)?;
    let parsed = parse_bool(&value);
    if parsed.is_none() {
        tracing::warn!(key, value = %value, "invalid boolean, ignoring");
    }
    parsed
}

fn env_parse<T>(key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    let Some(raw) = env_string(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, default = ?default, "invalid value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_falls_back_on_invalid() {
        std::env::set_var("PREPCOACH_TEST_WINDOW", "abc");
        assert_eq!(env_parse("PREPCOACH_TEST_WINDOW", 15usize, |v| *v > 0), 15);
        std::env::set_var("PREPCOACH_TEST_WINDOW", "0");
        assert_eq!(env_parse("PREPCOACH_TEST_WINDOW", 15usize, |v| *v > 0), 15);
        std::env::set_var("PREPCOACH_TEST_WINDOW", " 25 ");
        assert_eq!(env_parse("PREPCOACH_TEST_WINDOW", 15usize, |v| *v > 0), 25);
        std::env::remove_var("PREPCOACH_TEST_WINDOW");
    }

    #[test]
    fn test_env_bool() {
        std::env::set_var("PREPCOACH_TEST_FLAG", "off");
        assert_eq!(env_bool("PREPCOACH_TEST_FLAG"), Some(false));
        std::env::set_var("PREPCOACH_TEST_FLAG", "maybe");
        assert_eq!(env_bool("PREPCOACH_TEST_FLAG"), None);
        std::env::remove_var("PREPCOACH_TEST_FLAG");
    }

    #[test]
    fn test_default_settings() {
        let settings = StudySettings::default();
        assert_eq!(settings.default_quiz_size, 20);
        assert_eq!(settings.aggregator.recent_window, 15);
        assert_eq!(settings.quiz.recency, RecencyWindow::LastQuiz);
    }
}
