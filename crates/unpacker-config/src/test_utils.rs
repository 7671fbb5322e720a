/// Runs `f` with `vars` set, restoring the previous values afterwards.
///
/// Callers must be `#[serial]`: the process environment is shared.
pub fn with_env<F>(vars: &[(&str, &str)], f: F)
where
    F: FnOnce(),
{
    let saved: Vec<_> = vars
        .iter()
        .map(|(key, _)| (*key, std::env::var_os(key)))
        .collect();

    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    f();

    for (key, previous) in saved {
        match previous {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}
