use anyhow::{Result, anyhow, bail};
use std::env;
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage:
  relayrs label <image.png|jpg> [--model M] [--show-intermediate]
  relayrs evals (--requirements TEXT | --file PATH | --template NAME)
                [--planning-model M] [--knowledge-model M]
  relayrs templates
  relayrs last <label|evals>

Options:
  -o, --out DIR            write Markdown/HTML downloads to DIR
  -q, --quiet              only print the final document
  -h, --help               show this message";

/// Where the evals requirements text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementsSource {
    Text(String),
    File(PathBuf),
    Template(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Label { image: PathBuf },
    Evals { source: RequirementsSource },
    Templates,
    Last { pipeline: String },
    Help,
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: Command,
    pub out: Option<PathBuf>,            // -o/--out
    pub model: Option<String>,           // -m/--model (label, every stage)
    pub planning_model: Option<String>,  // --planning-model
    pub knowledge_model: Option<String>, // --knowledge-model
    pub show_intermediate: bool,         // --show-intermediate
    pub quiet: bool,                     // -q/--quiet
}

fn value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| anyhow!("{flag} requires a value"))
}

impl CliArgs {
    pub fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        Self::parse_from(&args[1..])
    }

    pub fn parse_from(args: &[String]) -> Result<Self> {
        let mut out = None;
        let mut model = None;
        let mut planning_model = None;
        let mut knowledge_model = None;
        let mut show_intermediate = false;
        let mut quiet = false;
        let mut help = false;
        let mut requirements: Vec<RequirementsSource> = Vec::new();
        let mut positional: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            match arg {
                "-o" | "--out" => out = Some(PathBuf::from(value(args, &mut i, arg)?)),
                "-m" | "--model" => model = Some(value(args, &mut i, arg)?),
                "--planning-model" => planning_model = Some(value(args, &mut i, arg)?),
                "--knowledge-model" | "--framework-model" => {
                    knowledge_model = Some(value(args, &mut i, arg)?)
                }
                "-r" | "--requirements" => {
                    requirements.push(RequirementsSource::Text(value(args, &mut i, arg)?))
                }
                "-f" | "--file" => requirements.push(RequirementsSource::File(PathBuf::from(
                    value(args, &mut i, arg)?,
                ))),
                "-t" | "--template" => {
                    requirements.push(RequirementsSource::Template(value(args, &mut i, arg)?))
                }
                "--show-intermediate" => show_intermediate = true,
                "-q" | "--quiet" => quiet = true,
                "-h" | "--help" => help = true,
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    bail!("Unknown argument: {flag}")
                }
                _ => positional.push(args[i].clone()),
            }
            i += 1;
        }

        let command = if help {
            Command::Help
        } else {
            Self::command(&positional, requirements)?
        };

        Ok(CliArgs {
            command,
            out,
            model,
            planning_model,
            knowledge_model,
            show_intermediate,
            quiet,
        })
    }

    fn command(
        positional: &[String],
        mut requirements: Vec<RequirementsSource>,
    ) -> Result<Command> {
        let Some((name, rest)) = positional.split_first() else {
            return Ok(Command::Help);
        };
        match (name.as_str(), rest) {
            ("label", [image]) => Ok(Command::Label {
                image: PathBuf::from(image),
            }),
            ("label", []) => bail!("label requires an image path"),
            ("evals", []) => match requirements.len() {
                0 => bail!("evals requires --requirements, --file or --template"),
                1 => Ok(Command::Evals {
                    source: requirements.remove(0),
                }),
                _ => bail!("use only one of --requirements, --file, --template"),
            },
            ("templates", []) => Ok(Command::Templates),
            ("last", [pipeline]) if pipeline == "label" || pipeline == "evals" => Ok(Command::Last {
                pipeline: pipeline.clone(),
            }),
            ("last", _) => bail!("last expects 'label' or 'evals'"),
            ("help", []) => Ok(Command::Help),
            (name, []) => bail!("Unknown command: {name}"),
            (name, extra) => bail!("Unexpected arguments for {name}: {}", extra.join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_no_args_is_help() {
        let parsed = CliArgs::parse_from(&args(&[])).unwrap();
        assert_eq!(parsed.command, Command::Help);
        assert!(!parsed.quiet);
        assert!(parsed.out.is_none());
    }

    #[test]
    fn parse_label_with_flags() {
        let parsed = CliArgs::parse_from(&args(&[
            "label",
            "chips.jpg",
            "--show-intermediate",
            "-o",
            "reports",
            "-m",
            "gpt-4o-mini",
        ]))
        .unwrap();
        assert_eq!(
            parsed.command,
            Command::Label {
                image: PathBuf::from("chips.jpg")
            }
        );
        assert!(parsed.show_intermediate);
        assert_eq!(parsed.out, Some(PathBuf::from("reports")));
        assert_eq!(parsed.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn parse_evals_sources() {
        let parsed =
            CliArgs::parse_from(&args(&["evals", "--template", "Educational Tutor Bot"])).unwrap();
        assert_eq!(
            parsed.command,
            Command::Evals {
                source: RequirementsSource::Template("Educational Tutor Bot".into())
            }
        );

        let parsed = CliArgs::parse_from(&args(&[
            "--planning-model",
            "Llama4 Scout",
            "evals",
            "-r",
            "A bot",
            "--knowledge-model",
            "gemma-7b-it",
        ]))
        .unwrap();
        assert_eq!(
            parsed.command,
            Command::Evals {
                source: RequirementsSource::Text("A bot".into())
            }
        );
        assert_eq!(parsed.planning_model.as_deref(), Some("Llama4 Scout"));
        assert_eq!(parsed.knowledge_model.as_deref(), Some("gemma-7b-it"));
    }

    #[test]
    fn evals_needs_exactly_one_source() {
        let err = CliArgs::parse_from(&args(&["evals"])).unwrap_err();
        assert!(err.to_string().contains("requires"));
        let err = CliArgs::parse_from(&args(&["evals", "-r", "a", "-f", "b.txt"])).unwrap_err();
        assert!(err.to_string().contains("only one"));
    }

    #[test]
    fn parse_last_and_templates() {
        let parsed = CliArgs::parse_from(&args(&["last", "evals"])).unwrap();
        assert_eq!(
            parsed.command,
            Command::Last {
                pipeline: "evals".into()
            }
        );
        assert!(CliArgs::parse_from(&args(&["last", "other"])).is_err());
        assert_eq!(
            CliArgs::parse_from(&args(&["templates"])).unwrap().command,
            Command::Templates
        );
    }

    #[test]
    fn missing_value_and_unknown_flag() {
        let err = CliArgs::parse_from(&args(&["label", "x.png", "--out"])).unwrap_err();
        assert!(err.to_string().contains("--out requires a value"));
        let err = CliArgs::parse_from(&args(&["--nope"])).unwrap_err();
        assert!(err.to_string().contains("Unknown argument: --nope"));
        let err = CliArgs::parse_from(&args(&["label", "a.png", "b.png"])).unwrap_err();
        assert!(err.to_string().contains("Unexpected arguments"));
    }

    #[test]
    fn help_flag_wins() {
        let parsed = CliArgs::parse_from(&args(&["evals", "--help"])).unwrap();
        assert_eq!(parsed.command, Command::Help);
    }
}
