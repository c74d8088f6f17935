// Console command grammar:
//   set key=value [key=value ...]
//   set key value
//   key=value [...]      same as set
//   start | stop | help | quit

use basalt::pipeline::params::{self, patch_from_pairs, ParamValue, Patch};

#[derive(Clone, Debug, PartialEq)]
pub enum HostCommand {
    Set(Patch),
    Start,
    Stop,
    Help,
    Quit,
}

pub const HELP: &str = "set key=value ... | set key value | start | stop | quit  (Tab: focus, Shift+Space: hold macro, see `set macro`)";

// Ok(None) for a blank line
pub fn parse(line: &str) -> anyhow::Result<Option<HostCommand>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let cmd = match head.to_ascii_lowercase().as_str() {
        "start" | "play" => HostCommand::Start,
        "stop" => HostCommand::Stop,
        "help" | "?" => HostCommand::Help,
        "quit" | "exit" | "q" => HostCommand::Quit,
        "set" => HostCommand::Set(parse_set(&rest)?),
        _ if head.contains('=') => {
            let mut all = vec![head];
            all.extend(rest);
            HostCommand::Set(parse_set(&all)?)
        }
        other => anyhow::bail!("unknown command '{other}', try help"),
    };
    Ok(Some(cmd))
}

fn parse_set(args: &[&str]) -> anyhow::Result<Patch> {
    match args {
        [] => anyhow::bail!("set needs key=value"),
        // `set pattern 0 1 - 3` keeps everything after the key as the value
        [key, value @ ..] if !key.contains('=') && !value.is_empty() => {
            let mut patch = Patch::new();
            patch.insert(key.to_string(), ParamValue::coerce(&value.join(" ")));
            Ok(patch)
        }
        pairs => {
            let patch = patch_from_pairs(pairs.iter().copied());
            if patch.is_empty() {
                anyhow::bail!("set needs key=value");
            }
            Ok(patch)
        }
    }
}

// keys the instrument won't recognise, so the console can say so
pub fn unknown_keys(patch: &Patch) -> Vec<&str> {
    patch
        .keys()
        .map(String::as_str)
        .filter(|k| params::lookup(k).is_none())
        .collect()
}
