use std::fmt::{self, Display, Write};

/// Write every item of `iter` to `out`, separated by `delim`.
pub(crate) fn iter_join_onto<W, I>(mut out: W, iter: I, delim: &str) -> fmt::Result
where
    W: Write,
    I: IntoIterator,
    I::Item: Display,
{
    for (i, item) in iter.into_iter().enumerate() {
        if i > 0 {
            out.write_str(delim)?;
        }
        write!(out, "{}", item)?;
    }
    Ok(())
}

/// Like [`iter_join_onto`], collecting into a new `String`.
pub(crate) fn iter_join<I>(iter: I, delim: &str) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut joined = String::new();
    // writing into a String cannot fail
    let _ = iter_join_onto(&mut joined, iter, delim);
    joined
}
