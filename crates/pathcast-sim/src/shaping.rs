use crate::topology::Namespace;
use std::io;

/// Link shaping parameters applied via `tc netem`.
///
/// All fields are optional — only set parameters are passed to netem.
/// Applying an empty shape removes any existing qdisc.
#[derive(Debug, Clone, Default)]
pub struct LinkShape {
    pub delay_ms: Option<u32>,
    pub jitter_ms: Option<u32>,
    pub loss_percent: Option<f32>,
    pub rate_kbit: Option<u64>,
}

impl LinkShape {
    pub fn is_unshaped(&self) -> bool {
        self.delay_ms.is_none() && self.loss_percent.is_none() && self.rate_kbit.is_none()
    }

    /// The netem parameter list for this shape.
    fn netem_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(delay) = self.delay_ms {
            args.push("delay".into());
            args.push(format!("{delay}ms"));
            if let Some(jitter) = self.jitter_ms {
                if jitter > 0 {
                    args.push(format!("{jitter}ms"));
                }
            }
        }

        if let Some(loss) = self.loss_percent {
            args.push("loss".into());
            args.push(format!("{loss}%"));
        }

        if let Some(rate) = self.rate_kbit {
            args.push("rate".into());
            args.push(format!("{rate}kbit"));
        }

        args
    }
}

/// Apply `shape` to an interface inside a namespace.
///
/// Removes any existing root qdisc first, then installs netem with the
/// specified delay, loss, and rate parameters.
pub fn apply_shape(ns: &Namespace, interface: &str, shape: &LinkShape) -> io::Result<()> {
    // remove existing qdisc (best effort) so re-applying starts clean
    let _ = ns.exec("tc", &["qdisc", "del", "dev", interface, "root"]);

    if shape.is_unshaped() {
        return Ok(());
    }

    let mut args_storage: Vec<String> = vec![
        "qdisc".into(),
        "add".into(),
        "dev".into(),
        interface.into(),
        "root".into(),
        "netem".into(),
    ];
    args_storage.extend(shape.netem_args());

    let args: Vec<&str> = args_storage.iter().map(|s| s.as_str()).collect();
    let output = ns.exec("tc", &args)?;
    if !output.status.success() {
        return Err(io::Error::other(format!(
            "failed to apply tc netem: {}\nCommand: tc {}",
            String::from_utf8_lossy(&output.stderr),
            args.join(" ")
        )));
    }

    Ok(())
}
