/// A vertex attribute. Declaration order is the order fields are packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexField {
    /// `f32 x 3`
    Position,
    /// `f32 x 4`
    BlendWeights,
    /// `u8 x 4`
    BlendIndices,
    /// `f32 x 3`
    Normal,
    /// `f32 x 3`
    Tangent,
    /// `f32 x 2`
    TexCoord,
    /// `u8 x 4`, normalised
    Colour,
}

impl VertexField {
    pub const fn size(self) -> usize {
        match self {
            VertexField::Position | VertexField::Normal | VertexField::Tangent => 12,
            VertexField::BlendWeights => 16,
            VertexField::BlendIndices | VertexField::Colour => 4,
            VertexField::TexCoord => 8,
        }
    }

    /// Whether the field holds three floats and can be read as a vector.
    pub const fn is_vec3(self) -> bool {
        matches!(
            self,
            VertexField::Position | VertexField::Normal | VertexField::Tangent
        )
    }
}

/// Ordered set of fields with their byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    fields: Vec<(VertexField, usize)>,
    stride: usize,
}

impl VertexLayout {
    /// Build a layout from the fields a mesh carries.
    ///
    /// Position is always included. Fields are packed in canonical order
    /// regardless of the order given; duplicates are ignored.
    pub fn new(fields: &[VertexField]) -> Self {
        let mut sorted: Vec<VertexField> = fields.to_vec();
        sorted.push(VertexField::Position);
        sorted.sort();
        sorted.dedup();

        let mut offset = 0;
        let fields = sorted
            .into_iter()
            .map(|field| {
                let entry = (field, offset);
                offset += field.size();
                entry
            })
            .collect();
        Self {
            fields,
            stride: offset,
        }
    }

    /// Position, normal and texture coordinate: the layout of the built-in shapes.
    pub fn lit() -> Self {
        Self::new(&[VertexField::Normal, VertexField::TexCoord])
    }

    /// Bytes per vertex.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn offset(&self, field: VertexField) -> Option<usize> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, offset)| *offset)
    }

    pub fn contains(&self, field: VertexField) -> bool {
        self.offset(field).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (VertexField, usize)> + '_ {
        self.fields.iter().copied()
    }
}
