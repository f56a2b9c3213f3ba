use super::ast::FieldDefinition;
use super::{TypeDefs, PROTECTED_FIELDS};
use crate::error::{MdGraphError, Result};
use log::{debug, warn};

impl TypeDefs {
    /// Append `fields` to every type named in `targets`, in both views.
    ///
    /// Protected fields are never appended, and a target that already declares
    /// a field keeps its own declaration. The text of each target body gets a
    /// `  name: Type` line per appended field, inserted before its closing
    /// brace. The result is re-parsed and must equal the structural copy.
    pub fn splice<'a, I, S>(&self, fields: I, targets: &[S]) -> Result<TypeDefs>
    where
        I: IntoIterator<Item = &'a FieldDefinition>,
        S: AsRef<str>,
    {
        let fields: Vec<&FieldDefinition> = fields
            .into_iter()
            .filter(|f| !PROTECTED_FIELDS.contains(&f.name.as_str()))
            .collect();

        let mut document = self.document.clone();
        let mut insertions: Vec<(usize, String)> = Vec::new();

        for target in targets {
            let target = target.as_ref();
            let offset = *self.body_ends.get(target).ok_or_else(|| {
                MdGraphError::Schema(format!("Splice target type '{target}' has no field body"))
            })?;
            let def = document
                .type_definition_mut(target)
                .filter(|def| def.kind.has_fields())
                .ok_or_else(|| {
                    MdGraphError::Schema(format!(
                        "Splice target '{target}' is not an object, interface or input type"
                    ))
                })?;

            let mut block = String::new();
            for field in &fields {
                if def.field(&field.name).is_some() {
                    warn!(
                        "Field '{}' is already declared on {target}, keeping the declared type",
                        field.name
                    );
                    continue;
                }
                block.push_str(&format!("  {}: {}\n", field.name, field.ty));
                def.fields.push((*field).clone());
            }
            if !block.is_empty() {
                insertions.push((offset, block));
            }
        }

        // Later offsets first, so earlier ones stay valid.
        insertions.sort_by(|a, b| b.0.cmp(&a.0));
        let mut source = self.source.clone();
        for (offset, block) in insertions {
            source.insert_str(offset, &block);
        }

        let spliced = TypeDefs::parse(source)?;
        if spliced.document != document {
            return Err(MdGraphError::Schema(
                "Spliced schema text does not match the spliced schema structure".into(),
            ));
        }
        debug!(
            "Spliced {} field(s) into {} type(s)",
            fields.len(),
            targets.len()
        );
        Ok(spliced)
    }
}
