use katex::{OptsBuilder, OutputType};

use crate::application::render::types::{MathOptions, RenderError, TypesetResult};

/// Typeset one expression with KaTeX, returning an inline or display fragment.
///
/// Parse errors are reported as [`TypesetResult::Unparseable`]; only a broken
/// engine configuration is an `Err`.
pub(crate) fn typeset_expression(
    expression: &str,
    display_mode: bool,
    options: &MathOptions,
) -> Result<TypesetResult, RenderError> {
    let mut builder = OptsBuilder::default();
    builder.display_mode(display_mode);
    builder.output_type(OutputType::Html);
    builder.throw_on_error(true);
    builder.trust(options.trust);

    let mut opts = builder.build().map_err(|err| RenderError::Math {
        message: format!("failed to build KaTeX options: {err}"),
    })?;
    for (name, expansion) in &options.macros {
        opts.add_macro(name.clone(), expansion.clone());
    }

    match katex::render_with_opts(expression, opts) {
        Ok(html) => Ok(TypesetResult::Typeset(html)),
        Err(katex::Error::JsExecError(reason)) => Ok(TypesetResult::Unparseable {
            source: expression.to_string(),
            reason,
        }),
        Err(err) => Err(RenderError::Math {
            message: format!("KaTeX engine failed: {err}"),
        }),
    }
}
