use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use wunderground_core::{Config, Feature, IntervalUnit, Wundergrounded};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wunderground", version, about = "Weather Underground CLI")]
pub struct Cli {
    /// Log every request phase.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the Weather Underground API key.
    Configure {
        /// Key to store; prompted for when omitted.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Fetch one batched response for a location query.
    Show {
        /// Location query, e.g. "94107" or "CA/San_Francisco".
        query: String,

        /// Feature to include; repeatable. Defaults to "conditions".
        #[arg(short, long = "feature")]
        features: Vec<String>,

        /// Include history for this date (YYYY-MM-DD).
        #[arg(long)]
        history: Option<String>,

        /// Include a trip planner for START END (YYYY-MM-DD each).
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        planner: Option<Vec<String>>,

        /// Cache responses for this many seconds.
        #[arg(long)]
        cache: Option<u64>,

        /// Allow at most this many requests per `--per` interval.
        #[arg(long)]
        limit: Option<u32>,

        /// Interval for `--limit`: second, minute, hour or day.
        #[arg(long, default_value = "minute")]
        per: String,
    },

    /// List the features that can be requested by name.
    Features,
}

impl Cli {
    /// Default log level: `debug` when the flag or the config file asks for it.
    pub fn log_level(&self, config: Option<&Config>) -> &'static str {
        if self.debug || config.is_some_and(|config| config.debug) {
            "debug"
        } else {
            "info"
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { api_key } => configure(api_key),
            Command::Features => {
                for feature in Feature::plain() {
                    println!("{feature}");
                }
                println!("history   (--history DATE)");
                println!("planner   (--planner START END)");
                Ok(())
            }
            Command::Show {
                query,
                features,
                history,
                planner,
                cache,
                limit,
                per,
            } => {
                let config = Config::load()?;
                let mut wu = Wundergrounded::from_config(&config)?;
                wu.debug(self.debug || config.debug);

                if let Some(ttl) = cache {
                    wu.cache(ttl, 0);
                }
                if let Some(tokens) = limit {
                    let interval: IntervalUnit = per.parse()?;
                    wu.try_limit(tokens, interval)?;
                }

                if features.is_empty() && history.is_none() && planner.is_none() {
                    wu.conditions();
                }
                for name in &features {
                    wu.feature(Feature::try_from(name.as_str())?);
                }
                if let Some(date) = &history {
                    wu.try_history(date)?;
                }
                if let Some(range) = &planner {
                    match range.as_slice() {
                        [start, end] => {
                            wu.try_planner(start, end)?;
                        }
                        _ => bail!("--planner takes a START and an END date"),
                    }
                }

                let body = wu.request(&query).await?;
                let pretty = serde_json::to_string_pretty(&body)
                    .context("Failed to format response as JSON")?;
                println!("{pretty}");
                Ok(())
            }
        }
    }
}

fn configure(api_key: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let key = match api_key {
        Some(key) => key,
        None => Password::new("Weather Underground API key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?,
    };
    let key = key.trim().to_string();
    if key.is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(key);
    config.save()?;
    println!("Saved API key to {}", Config::config_file_path()?.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_parses_repeated_features_and_planner() {
        let cli = Cli::try_parse_from([
            "wunderground",
            "show",
            "94107",
            "-f",
            "conditions",
            "--feature",
            "tide",
            "--planner",
            "2024-05-01",
            "2024-05-15",
            "--limit",
            "5",
        ])
        .unwrap();

        match cli.command {
            Command::Show {
                query,
                features,
                planner,
                limit,
                per,
                ..
            } => {
                assert_eq!(query, "94107");
                assert_eq!(features, vec!["conditions", "tide"]);
                assert_eq!(
                    planner,
                    Some(vec!["2024-05-01".to_string(), "2024-05-15".to_string()])
                );
                assert_eq!(limit, Some(5));
                assert_eq!(per, "minute");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn debug_flag_is_global() {
        let cli = Cli::try_parse_from(["wunderground", "features", "--debug"]).unwrap();
        assert!(cli.debug);
    }

    #[test]
    fn config_debug_raises_log_level() {
        let cli = Cli::try_parse_from(["wunderground", "features"]).unwrap();
        let config = Config {
            debug: true,
            ..Config::default()
        };

        assert_eq!(cli.log_level(None), "info");
        assert_eq!(cli.log_level(Some(&Config::default())), "info");
        assert_eq!(cli.log_level(Some(&config)), "debug");
    }

    #[test]
    fn debug_flag_wins_without_config() {
        let cli = Cli::try_parse_from(["wunderground", "--debug", "features"]).unwrap();
        assert_eq!(cli.log_level(None), "debug");
    }
}
