//! Parser for apt's progress output.
//!
//! With `APT::Status-Fd` set, apt writes machine-readable records such as
//! `dlstatus:3:42.8571:Retrieving file 3 of 7` and
//! `pmstatus:libc6:amd64:35.0000:Unpacking libc6 (amd64)`. The cache phases
//! and fetched items only show up as ordinary output lines, so those are
//! recognised too.

use apn_core::ProgressEvent;

const CACHE_PHASES: [&str; 4] = [
    "Reading package lists",
    "Building dependency tree",
    "Reading state information",
    "Calculating upgrade",
];

/// Turns one line of apt output into a progress event, if it carries one.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix("dlstatus:") {
        return parse_dlstatus(rest);
    }
    if let Some(rest) = line.strip_prefix("pmstatus:") {
        let (package, percent, status) = split_record(rest)?;
        return Some(ProgressEvent::InstallStatus {
            package,
            percent,
            status,
        });
    }
    if let Some(rest) = line.strip_prefix("pmerror:") {
        let (package, _, message) = split_record(rest)?;
        return Some(ProgressEvent::InstallError { package, message });
    }
    if let Some(rest) = line.strip_prefix("pmconffile:") {
        return parse_conffile(rest);
    }

    if let Some(event) = parse_fetch_line(line) {
        return Some(event);
    }

    parse_phase_line(line)
}

// dlstatus:<item>:<percent>:<description>
fn parse_dlstatus(rest: &str) -> Option<ProgressEvent> {
    let mut fields = rest.splitn(3, ':');
    let _item = fields.next()?;
    let percent = fields.next()?.trim().parse::<f64>().ok();
    let description = fields.next().unwrap_or_default().trim().to_string();

    Some(ProgressEvent::Acquire {
        percent,
        description,
    })
}

// <package>:<percent>:<message>, where the package may be `name:arch` and the
// message may contain colons of its own. The percent is the first numeric
// field after the package.
fn split_record(rest: &str) -> Option<(String, f64, String)> {
    let fields: Vec<&str> = rest.split(':').collect();

    let idx = fields
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, f)| f.trim().parse::<f64>().is_ok())
        .map(|(i, _)| i)?;

    let package = fields[..idx].join(":");
    let percent = fields[idx].trim().parse::<f64>().ok()?;
    let message = fields[idx + 1..].join(":").trim().to_string();

    Some((package, percent, message))
}

// pmconffile:<conffile>:<percent>:'<current>' '<new>' <useredited> <distedited>
fn parse_conffile(rest: &str) -> Option<ProgressEvent> {
    let (_, _, detail) = split_record(rest)?;
    let quoted: Vec<&str> = detail.split('\'').collect();

    // 'a' 'b' splits into ["", a, " ", b, ...]
    if quoted.len() < 4 {
        return None;
    }

    Some(ProgressEvent::Conffile {
        current: quoted[1].to_string(),
        new: quoted[3].to_string(),
    })
}

// Get:1 http://archive.ubuntu.com/ubuntu jammy InRelease [270 kB]
// Hit:2 http://security.ubuntu.com/ubuntu jammy-security InRelease
fn parse_fetch_line(line: &str) -> Option<ProgressEvent> {
    let rest = line
        .strip_prefix("Get:")
        .or_else(|| line.strip_prefix("Hit:"))?;
    let (id, description) = rest.split_once(' ')?;

    if !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(ProgressEvent::AcquireDone {
        description: description.trim().to_string(),
    })
}

// "Reading package lists..." starts a phase, "Reading package lists... Done"
// finishes it
fn parse_phase_line(line: &str) -> Option<ProgressEvent> {
    let phase = CACHE_PHASES.iter().find(|p| line.starts_with(*p))?;
    let tail = line[phase.len()..].trim_start_matches('.').trim();

    if tail == "Done" {
        return Some(ProgressEvent::OperationDone);
    }

    // "Reading database ... 45%" style tails carry a percentage
    let percent = tail
        .strip_suffix('%')
        .and_then(|p| p.trim().parse::<f64>().ok());

    Some(ProgressEvent::Operation {
        op: phase.to_string(),
        subop: None,
        percent,
    })
}

/// Returns the warning text of a `W:` line.
pub fn parse_warning(line: &str) -> Option<&str> {
    line.strip_prefix("W:").map(str::trim)
}
