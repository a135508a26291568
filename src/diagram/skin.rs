//! Style descriptors for the diagram renderer.
//!
//! The source this runtime is modelled on built skins by reflecting over tagged struct fields
//! at render time. Rust has no such reflection, so a [`Skin`] here is built with an explicit
//! builder instead: each call records one `skinparam` line or one `!$variable` line, in the
//! order they're added, and [`Skin::render`] just joins them. The output format matches exactly
//! — a diagramming backend can't tell the difference.

/// A fully-resolved style sheet, ready to be prepended to a rendered diagram.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Skin {
    include: Option<String>,
    skinparams: Vec<(String, String)>,
    variables: Vec<(String, String)>,
}

impl Skin {
    /// Starts an empty skin.
    pub fn builder() -> SkinBuilder {
        SkinBuilder::default()
    }

    /// Renders the `!include`, `skinparam`, and `!$variable` lines, in that order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(include) = &self.include {
            out.push_str(&format!("!include {include}\n"));
        }
        for (key, value) in &self.skinparams {
            out.push_str(&format!("skinparam {key} {value} \n"));
        }
        for (key, value) in &self.variables {
            out.push_str(&format!("!${key} = \"{value}\" \n"));
        }
        out
    }
}

/// Builds a [`Skin`] one parameter at a time.
#[derive(Default)]
pub struct SkinBuilder {
    include: Option<String>,
    skinparams: Vec<(String, String)>,
    variables: Vec<(String, String)>,
}

impl SkinBuilder {
    /// Points the diagram at a remote `.skin` file instead of inlining parameters.
    pub fn include(mut self, url: impl Into<String>) -> Self {
        self.include = Some(url.into());
        self
    }

    /// Sets a `skinparam <name> <value>` line. Later calls with the same `name` both render,
    /// in order added, matching the source's field-by-field emission.
    pub fn skinparam(mut self, name: &str, value: impl ToString) -> Self {
        self.skinparams.push((name.to_owned(), value.to_string()));
        self
    }

    /// Sets a `!$name = "value"` line.
    pub fn variable(mut self, name: &str, value: impl ToString) -> Self {
        self.variables.push((name.to_owned(), value.to_string()));
        self
    }

    /// Finalizes the skin.
    pub fn build(self) -> Skin {
        Skin {
            include: self.include,
            skinparams: self.skinparams,
            variables: self.variables,
        }
    }
}

/// The demo service's blueprint skin: a light canvas with teal accents.
pub fn demo_blueprint_skin() -> Skin {
    Skin::builder()
        .skinparam("backgroundColor", "#ffffff")
        .skinparam("defaultFontColor", "#3c415e")
        .skinparam("ActivityBackgroundColor", "#fafafa")
        .skinparam("ActivityFontName", "Tahoma")
        .skinparam("ActivityFontColor", "#1cb3c8")
        .skinparam("ActivityFontSize", 13)
        .skinparam("ActivityFontStyle", "bold")
        .variable("packageColor", "#738598")
        .skinparam("ActivityDiamondBackgroundColor", "#1cb3c8")
        .skinparam("ActivityDiamondFontName", "Tahoma")
        .skinparam("ActivityDiamondFontColor", "#3c415e")
        .skinparam("ActivityDiamondFontSize", 13)
        .skinparam("ActivityDiamondFontStyle", "bold italic")
        .skinparam("ActivityDiamondBorderColor", "#3c415e")
        .skinparam("NoteBackgroundColor", "#ffffff")
        .skinparam("NoteBorderColor", "#ffffff")
        .skinparam("NoteBorderThickness", 1)
        .skinparam("NoteFontColor", "#3c415e")
        .skinparam("NoteFontName", "Arial")
        .skinparam("NoteFontSize", 11)
        .skinparam("NoteFontStyle", "bold")
        .skinparam("NoteShadowing", true)
        .skinparam("NoteTextAlignment", "left")
        .skinparam("ArrowColor", "#738598")
        .skinparam("ArrowFontColor", "#3c415e")
        .skinparam("ArrowFontSize", 10)
        .skinparam("ArrowFontStyle", "italic")
        .skinparam("ArrowMessageAlignment", "center")
        .skinparam("ActivityBarColor", "#3c415e")
        .build()
}

/// The demo service's trace skin: a dark canvas, matching `demo_blueprint_skin`'s palette.
pub fn demo_trace_skin() -> Skin {
    Skin::builder()
        .skinparam("backgroundColor", "#222831")
        .skinparam("shadowing", true)
        .skinparam("defaultFontColor", "#eeeeee")
        .skinparam("HyperlinkColor", "#00adb5")
        .skinparam("ActivityBackgroundColor", "#393e46")
        .skinparam("ActivityFontName", "Tahoma")
        .skinparam("ActivityFontColor", "#00adb5")
        .skinparam("ActivityFontSize", 12)
        .skinparam("ActivityBorderColor", "#222831")
        .skinparam("ActivityBorderThickness", 1)
        .variable("packageColor", "#222831")
        .skinparam("PartitionBackgroundColor", "#222831")
        .skinparam("PartitionFontName", "Tahoma")
        .skinparam("PartitionFontColor", "#00adb5")
        .skinparam("PartitionFontSize", 12)
        .skinparam("PartitionFontStyle", "bold")
        .skinparam("PartitionBorderColor", "#222831")
        .skinparam("PartitionBorderThickness", 1)
        .skinparam("NoteBackgroundColor", "#393e46")
        .skinparam("NoteBorderColor", "#00adb5")
        .skinparam("NoteBorderThickness", 1)
        .skinparam("NoteFontColor", "#eeeeee")
        .skinparam("NoteFontName", "Arial")
        .skinparam("NoteFontSize", 12)
        .skinparam("NoteFontStyle", "bold")
        .skinparam("NoteShadowing", true)
        .skinparam("NoteTextAlignment", "left")
        .skinparam("ArrowColor", "#393e46")
        .skinparam("ArrowFontColor", "#00adb5")
        .skinparam("ArrowFontSize", 10)
        .skinparam("ArrowFontStyle", "italic")
        .skinparam("ArrowMessageAlignment", "center")
        .skinparam("ActivityBarColor", "#393e46")
        .variable("traceTagColor", "#eeeeee")
        .variable("errorColor", "#ffffff")
        .variable("errorSize", 16)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_orders_include_then_skinparams_then_variables() {
        let skin = Skin::builder()
            .skinparam("ActivityFontSize", 13)
            .variable("packageColor", "#738598")
            .include("https://example.com/theme.skin")
            .build();
        let rendered = skin.render();
        let include_pos = rendered.find("!include").unwrap();
        let skinparam_pos = rendered.find("skinparam").unwrap();
        let variable_pos = rendered.find("!$packageColor").unwrap();
        assert!(include_pos < skinparam_pos);
        assert!(skinparam_pos < variable_pos);
    }
}
