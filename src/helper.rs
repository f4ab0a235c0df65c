/// Formats an error and its whole chain of causes
///
/// Used to implement `Debug` on our error enums: the default derived `Debug`
/// only shows the top-level error, while we want the full chain when an error
/// bubbles up to the logs.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;

    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }

    Ok(())
}
