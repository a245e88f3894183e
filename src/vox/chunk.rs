//! Chunk tree codec
//!
//! Every record is framed the same way: a 4-byte tag, a declared body
//! length, a declared children length, the body, then nested child chunks.
//! One shared framing routine owns the header and boundary handling and
//! dispatches the body to the per-variant codecs below, so every variant
//! knows its own declared size.
//!
//! Declared lengths are authoritative. A body or child loop that does not
//! land exactly on its declared boundary is realigned by seeking, recorded
//! as a [`Diagnostic`], and decode continues. On encode, lengths are
//! recomputed from the variant size functions, never cached, and the writer
//! verifies each body emitted exactly the declared byte count.

use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec2, Vec3};

use crate::core::{ConsistencyError, Error, FormatError};
use crate::vox::dict;
use crate::vox::material::{MaterialAttrs, MaterialKind};
use crate::vox::palette::{PALETTE_SIZE, Rgba};
use crate::vox::stream::{ByteReader, ByteWriter, Diagnostic};
use crate::vox::tag::ChunkTag;

/// Bytes in a chunk header: tag, body length, children length.
pub const HEADER_SIZE: usize = 12;

const KEY_NAME: &str = "_name";
const KEY_HIDDEN: &str = "_hidden";
const KEY_ROTATION: &str = "_r";
const KEY_TRANSLATION: &str = "_t";
const KEY_TYPE: &str = "_type";
const KEY_WEIGHT: &str = "_weight";
const KEY_ROUGH: &str = "_rough";
const KEY_IOR: &str = "_ior";
const KEY_SPECULAR: &str = "_sp";
const KEY_METAL: &str = "_metal";
const KEY_EMIT: &str = "_emit";
const KEY_EMISSION: &str = "_emission";
const KEY_FLUX: &str = "_flux";
const KEY_LDR: &str = "_ldr";
const KEY_ALPHA: &str = "_alpha";
const KEY_TRANS: &str = "_trans";
const KEY_DENSITY: &str = "_d";
const KEY_INTENSITY: &str = "_I";
const KEY_COLOR: &str = "_color";
const KEY_ANGLE: &str = "_angle";
const KEY_AREA: &str = "_area";
const KEY_AIR_DENSITY: &str = "_density";
const KEY_SCATTER: &str = "_scatter";
const KEY_FOV: &str = "_fov";
const KEY_DOF: &str = "_dof";
const KEY_EXPOSURE: &str = "_exp";
const KEY_VIGNETTE: &str = "_vig";
const KEY_STEREO: &str = "_sg";
const KEY_GAMMA: &str = "_gam";
const KEY_MIX: &str = "_mix";
const KEY_SCALE: &str = "_scale";
const KEY_THRESHOLD: &str = "_threshold";
const KEY_GROUND: &str = "_gd_color";
const KEY_BACKGROUND: &str = "_bg_color";
const KEY_EDGE: &str = "_edge_color";

/// Dictionary entries a variant would emit, in its canonical order.
/// Sizing and writing both go through this so they cannot disagree.
type Entries = Vec<(&'static str, String)>;

fn entries_size(entries: &Entries) -> usize {
    4 + entries
        .iter()
        .map(|(k, v)| dict::entry_size(k, v))
        .sum::<usize>()
}

fn write_entries(w: &mut ByteWriter, entries: &Entries) {
    w.write_i32(entries.len() as i32);
    for (key, value) in entries {
        dict::write_entry(w, key, value);
    }
}

/// Opaque body, kept verbatim. Used by the container root and the render
/// chunks whose contents the importer does not interpret.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawBody {
    pub bytes: Vec<u8>,
}

impl RawBody {
    fn read(r: &mut ByteReader, body_len: usize) -> Result<Self, FormatError> {
        Ok(Self {
            bytes: r.take(body_len)?.to_vec(),
        })
    }
}

/// `PACK`: number of models that follow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackBody {
    pub models: i32,
}

/// `SIZE`: extent of the volume the next point list fills.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SizeBody {
    pub extent: IVec3,
}

/// One voxel record of a point list: coordinates plus palette index.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VoxelPoint {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub index: u8,
}

impl VoxelPoint {
    pub fn new(x: u8, y: u8, z: u8, index: u8) -> Self {
        Self { x, y, z, index }
    }
}

/// `XYZI`: sparse voxel point list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelsBody {
    pub points: Vec<VoxelPoint>,
}

/// Fields shared by the three scene-node chunk variants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeHeader {
    pub id: i32,
    pub name: String,
    pub hidden: bool,
}

impl NodeHeader {
    fn read(r: &mut ByteReader, chunk: &'static str) -> Result<Self, FormatError> {
        let mut header = NodeHeader {
            id: r.read_i32()?,
            ..Default::default()
        };
        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_NAME => header.name = value,
                KEY_HIDDEN => header.hidden = dict::parse_bool(&value)?,
                _ => return Err(FormatError::UnknownKey { chunk, key }),
            }
        }
        Ok(header)
    }

    fn entries(&self) -> Entries {
        let mut entries = Entries::new();
        if !self.name.is_empty() {
            entries.push((KEY_NAME, self.name.clone()));
        }
        if self.hidden {
            entries.push((KEY_HIDDEN, "1".to_string()));
        }
        entries
    }

    fn size(&self) -> usize {
        4 + entries_size(&self.entries())
    }

    fn write(&self, w: &mut ByteWriter) {
        w.write_i32(self.id);
        write_entries(w, &self.entries());
    }
}

/// Single animation frame of a transform node.
///
/// The rotation is the raw wire integer; decode it against the container
/// version with [`crate::vox::rotation::decode_rotation`]. Keeping it raw
/// makes re-encoding byte-exact under either orientation codec.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransformFrame {
    pub rotation: Option<i32>,
    pub translation: Option<Vec3>,
}

impl TransformFrame {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let mut frame = TransformFrame::default();
        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_ROTATION => frame.rotation = Some(dict::parse_int(&value)?),
                KEY_TRANSLATION => frame.translation = Some(dict::parse_vec3(&value)?),
                _ => return Err(FormatError::UnknownKey { chunk: "nTRN", key }),
            }
        }
        Ok(frame)
    }

    fn entries(&self) -> Entries {
        let mut entries = Entries::new();
        if let Some(rotation) = self.rotation {
            entries.push((KEY_ROTATION, dict::fmt_int(rotation)));
        }
        if let Some(translation) = self.translation {
            entries.push((KEY_TRANSLATION, dict::fmt_vec3(translation)));
        }
        entries
    }
}

/// `nTRN`: transform node referencing one child node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformBody {
    pub node: NodeHeader,
    /// Index of the referenced node in the flat scene container.
    pub child: i32,
    pub reserved: i32,
    pub layer: i32,
    pub frames: i32,
    pub frame: TransformFrame,
}

impl TransformBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        Ok(Self {
            node: NodeHeader::read(r, "nTRN")?,
            child: r.read_i32()?,
            reserved: r.read_i32()?,
            layer: r.read_i32()?,
            frames: r.read_i32()?,
            frame: TransformFrame::read(r)?,
        })
    }

    fn size(&self) -> usize {
        self.node.size() + 4 * 4 + entries_size(&self.frame.entries())
    }

    fn write(&self, w: &mut ByteWriter) {
        self.node.write(w);
        w.write_i32(self.child);
        w.write_i32(self.reserved);
        w.write_i32(self.layer);
        w.write_i32(self.frames);
        write_entries(w, &self.frame.entries());
    }
}

/// `nGRP`: group node fanning out to several child nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupBody {
    pub node: NodeHeader,
    /// Indices of child nodes in the flat scene container.
    pub children: Vec<i32>,
}

impl GroupBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let node = NodeHeader::read(r, "nGRP")?;
        let count = r.read_len()?;
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            children.push(r.read_i32()?);
        }
        Ok(Self { node, children })
    }

    fn size(&self) -> usize {
        self.node.size() + 4 + 4 * self.children.len()
    }

    fn write(&self, w: &mut ByteWriter) {
        self.node.write(w);
        w.write_i32(self.children.len() as i32);
        for &child in &self.children {
            w.write_i32(child);
        }
    }
}

/// `nSHP`: shape node referencing a meshed model by index.
///
/// Trailing body bytes past the known fields are preserved verbatim so the
/// declared length survives re-encode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShapeBody {
    pub node: NodeHeader,
    pub flag: i32,
    pub model: i32,
    pub rest: Vec<u8>,
}

impl ShapeBody {
    fn read(r: &mut ByteReader, body_start: usize, body_len: usize) -> Result<Self, FormatError> {
        let node = NodeHeader::read(r, "nSHP")?;
        let flag = r.read_i32()?;
        let model = r.read_i32()?;
        let consumed = r.pos() - body_start;
        let rest = r.take(body_len.saturating_sub(consumed))?.to_vec();
        Ok(Self {
            node,
            flag,
            model,
            rest,
        })
    }

    fn size(&self) -> usize {
        self.node.size() + 2 * 4 + self.rest.len()
    }

    fn write(&self, w: &mut ByteWriter) {
        self.node.write(w);
        w.write_i32(self.flag);
        w.write_i32(self.model);
        w.write_bytes(&self.rest);
    }
}

/// `LAYR`: named layer, trailing bytes preserved verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayerBody {
    pub index: i32,
    pub name: String,
    pub hidden: bool,
    pub rest: Vec<u8>,
}

impl LayerBody {
    fn read(r: &mut ByteReader, body_start: usize, body_len: usize) -> Result<Self, FormatError> {
        let mut layer = LayerBody {
            index: r.read_i32()?,
            ..Default::default()
        };
        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_NAME => layer.name = value,
                KEY_HIDDEN => layer.hidden = dict::parse_bool(&value)?,
                _ => return Err(FormatError::UnknownKey { chunk: "LAYR", key }),
            }
        }
        let consumed = r.pos() - body_start;
        layer.rest = r.take(body_len.saturating_sub(consumed))?.to_vec();
        Ok(layer)
    }

    fn entries(&self) -> Entries {
        let mut entries = Entries::new();
        if !self.name.is_empty() {
            entries.push((KEY_NAME, self.name.clone()));
        }
        if self.hidden {
            entries.push((KEY_HIDDEN, "1".to_string()));
        }
        entries
    }

    fn size(&self) -> usize {
        4 + entries_size(&self.entries()) + self.rest.len()
    }

    fn write(&self, w: &mut ByteWriter) {
        w.write_i32(self.index);
        write_entries(w, &self.entries());
        w.write_bytes(&self.rest);
    }
}

/// `RGBA`: the 256-entry palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteBody {
    pub colors: Box<[Rgba; PALETTE_SIZE]>,
}

impl Default for PaletteBody {
    fn default() -> Self {
        Self {
            colors: Box::new([Rgba::default(); PALETTE_SIZE]),
        }
    }
}

impl PaletteBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let bytes = r.take(PALETTE_SIZE * 4)?;
        let mut body = PaletteBody::default();
        for (slot, raw) in body.colors.iter_mut().zip(bytes.chunks_exact(4)) {
            *slot = Rgba::new(raw[0], raw[1], raw[2], raw[3]);
        }
        Ok(body)
    }

    fn write(&self, w: &mut ByteWriter) {
        for color in self.colors.iter() {
            w.write_bytes(&color.to_array());
        }
    }
}

/// `MATL`: typed key-value material for one palette slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MaterialBody {
    pub id: i32,
    pub kind: MaterialKind,
    pub attrs: MaterialAttrs,
}

impl MaterialBody {
    fn read(r: &mut ByteReader, diags: &mut Vec<Diagnostic>) -> Result<Self, FormatError> {
        let id = r.read_i32()?;
        let mut kind = MaterialKind::default();
        let mut attrs = MaterialAttrs::default();

        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_TYPE => {
                    kind = MaterialKind::from_type_value(&value).ok_or_else(|| {
                        FormatError::BadValue {
                            what: "material type",
                            value: value.clone(),
                        }
                    })?;
                }
                // The kind-specific weight; diffuse carries no weight field.
                KEY_WEIGHT => {
                    let weight = dict::parse_float(&value)?;
                    match kind {
                        MaterialKind::Diffuse => {
                            if weight != 1.0 {
                                diags.push(Diagnostic::DiffuseWeight { value: weight });
                            }
                        }
                        MaterialKind::Metal => attrs.metal = weight,
                        MaterialKind::Glass => attrs.transparency = weight,
                        MaterialKind::Emissive => attrs.emission = weight,
                    }
                }
                KEY_ROUGH => attrs.roughness = dict::parse_float(&value)?,
                KEY_IOR => attrs.ior = dict::parse_float(&value)?,
                KEY_SPECULAR => attrs.specular = dict::parse_float(&value)?,
                KEY_METAL => attrs.metal = dict::parse_float(&value)?,
                KEY_EMIT | KEY_EMISSION => attrs.emission = dict::parse_float(&value)?,
                KEY_FLUX => attrs.flux = dict::parse_float(&value)?,
                KEY_LDR => attrs.low_dynamic_range = dict::parse_float(&value)?,
                KEY_ALPHA => attrs.alpha = dict::parse_float(&value)?,
                KEY_TRANS => attrs.transparency = dict::parse_float(&value)?,
                KEY_DENSITY => attrs.density = dict::parse_float(&value)?,
                _ => {
                    log::warn!("ignoring material key {key}={value}");
                    diags.push(Diagnostic::UnknownMaterialKey { key, value });
                }
            }
        }

        Ok(Self { id, kind, attrs })
    }

    fn entries(&self) -> Entries {
        let mut entries = vec![(KEY_TYPE, self.kind.type_value().to_string())];
        let a = &self.attrs;
        for (key, value) in [
            (KEY_ROUGH, a.roughness),
            (KEY_IOR, a.ior),
            (KEY_SPECULAR, a.specular),
            (KEY_METAL, a.metal),
            (KEY_EMIT, a.emission),
            (KEY_FLUX, a.flux),
            (KEY_LDR, a.low_dynamic_range),
            (KEY_ALPHA, a.alpha),
            (KEY_TRANS, a.transparency),
            (KEY_DENSITY, a.density),
        ] {
            if value != 0.0 {
                entries.push((key, dict::fmt_float(value)));
            }
        }
        entries
    }

    fn size(&self) -> usize {
        4 + entries_size(&self.entries())
    }

    fn write(&self, w: &mut ByteWriter) {
        w.write_i32(self.id);
        write_entries(w, &self.entries());
    }
}

/// `rLIT`: render lighting settings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightingBody {
    pub kind: String,
    pub intensity: f32,
    pub color: Rgba,
    pub angle: Vec2,
    pub area: f32,
}

impl LightingBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let mut body = LightingBody::default();
        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_TYPE => body.kind = value,
                KEY_INTENSITY => body.intensity = dict::parse_float(&value)?,
                KEY_COLOR => body.color = dict::parse_rgb(&value)?,
                KEY_ANGLE => body.angle = dict::parse_vec2(&value)?,
                KEY_AREA => body.area = dict::parse_float(&value)?,
                _ => return Err(FormatError::UnknownKey { chunk: "rLIT", key }),
            }
        }
        Ok(body)
    }

    fn entries(&self) -> Entries {
        let mut entries = vec![
            (KEY_TYPE, self.kind.clone()),
            (KEY_INTENSITY, dict::fmt_float(self.intensity)),
        ];
        if self.color != Rgba::default() {
            entries.push((KEY_COLOR, dict::fmt_rgb(self.color)));
        }
        if self.angle != Vec2::ZERO {
            entries.push((KEY_ANGLE, dict::fmt_vec2(self.angle)));
        }
        if self.area != 0.0 {
            entries.push((KEY_AREA, dict::fmt_float(self.area)));
        }
        entries
    }
}

/// `rAIR`: atmosphere settings; every field is always written.
#[derive(Clone, Debug, PartialEq)]
pub struct AtmosphereBody {
    pub kind: String,
    pub density: f32,
    pub color: Rgba,
    pub scattering: bool,
}

impl Default for AtmosphereBody {
    fn default() -> Self {
        Self {
            kind: String::new(),
            density: 0.0,
            color: Rgba::default(),
            scattering: true,
        }
    }
}

impl AtmosphereBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let mut body = AtmosphereBody::default();
        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_TYPE => body.kind = value,
                KEY_AIR_DENSITY => body.density = dict::parse_float(&value)?,
                KEY_COLOR => body.color = dict::parse_rgb(&value)?,
                KEY_SCATTER => body.scattering = dict::parse_bool(&value)?,
                _ => return Err(FormatError::UnknownKey { chunk: "rAIR", key }),
            }
        }
        Ok(body)
    }

    fn entries(&self) -> Entries {
        vec![
            (KEY_TYPE, self.kind.clone()),
            (KEY_AIR_DENSITY, dict::fmt_float(self.density)),
            (KEY_COLOR, dict::fmt_rgb(self.color)),
            (KEY_SCATTER, dict::fmt_bool(self.scattering).to_string()),
        ]
    }
}

/// `rLEN`: camera lens settings; every field is always written.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LensBody {
    pub fov: f32,
    pub depth_of_field: f32,
    pub exposure: f32,
    pub vignette: f32,
    pub stereo: f32,
    pub gamma: f32,
}

impl LensBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let mut body = LensBody::default();
        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_FOV => body.fov = dict::parse_float(&value)?,
                KEY_DOF => body.depth_of_field = dict::parse_float(&value)?,
                KEY_EXPOSURE => body.exposure = dict::parse_float(&value)?,
                KEY_VIGNETTE => body.vignette = dict::parse_float(&value)?,
                KEY_STEREO => body.stereo = dict::parse_float(&value)?,
                KEY_GAMMA => body.gamma = dict::parse_float(&value)?,
                _ => return Err(FormatError::UnknownKey { chunk: "rLEN", key }),
            }
        }
        Ok(body)
    }

    fn entries(&self) -> Entries {
        vec![
            (KEY_FOV, dict::fmt_float(self.fov)),
            (KEY_DOF, dict::fmt_float(self.depth_of_field)),
            (KEY_EXPOSURE, dict::fmt_float(self.exposure)),
            (KEY_VIGNETTE, dict::fmt_float(self.vignette)),
            (KEY_STEREO, dict::fmt_float(self.stereo)),
            (KEY_GAMMA, dict::fmt_float(self.gamma)),
        ]
    }
}

/// `POST`: post-process pass settings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PostBody {
    pub kind: String,
    pub mix: f32,
    pub scale: f32,
    pub threshold: f32,
}

impl PostBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let mut body = PostBody::default();
        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_TYPE => body.kind = value,
                KEY_MIX => body.mix = dict::parse_float(&value)?,
                KEY_SCALE => body.scale = dict::parse_float(&value)?,
                KEY_THRESHOLD => body.threshold = dict::parse_float(&value)?,
                _ => return Err(FormatError::UnknownKey { chunk: "POST", key }),
            }
        }
        Ok(body)
    }

    fn entries(&self) -> Entries {
        let mut entries = vec![
            (KEY_TYPE, self.kind.clone()),
            (KEY_MIX, dict::fmt_float(self.mix)),
        ];
        if self.scale != 0.0 {
            entries.push((KEY_SCALE, dict::fmt_float(self.scale)));
        }
        if self.threshold != 0.0 {
            entries.push((KEY_THRESHOLD, dict::fmt_float(self.threshold)));
        }
        entries
    }
}

/// `rDIS`: viewport colors; every field is always written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewBody {
    pub ground: Rgba,
    pub background: Rgba,
    pub edge: Rgba,
}

impl ViewBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let mut body = ViewBody::default();
        for _ in 0..r.read_len()? {
            let (key, value) = dict::read_entry(r)?;
            match key.as_str() {
                KEY_GROUND => body.ground = dict::parse_rgb(&value)?,
                KEY_BACKGROUND => body.background = dict::parse_rgb(&value)?,
                KEY_EDGE => body.edge = dict::parse_rgb(&value)?,
                _ => return Err(FormatError::UnknownKey { chunk: "rDIS", key }),
            }
        }
        Ok(body)
    }

    fn entries(&self) -> Entries {
        vec![
            (KEY_GROUND, dict::fmt_rgb(self.ground)),
            (KEY_BACKGROUND, dict::fmt_rgb(self.background)),
            (KEY_EDGE, dict::fmt_rgb(self.edge)),
        ]
    }
}

/// `IMAP`: palette slot remap table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMapBody {
    pub map: Box<[u8; PALETTE_SIZE]>,
}

impl Default for IndexMapBody {
    fn default() -> Self {
        Self {
            map: Box::new([0; PALETTE_SIZE]),
        }
    }
}

impl IndexMapBody {
    fn read(r: &mut ByteReader) -> Result<Self, FormatError> {
        let mut body = IndexMapBody::default();
        body.map.copy_from_slice(r.take(PALETTE_SIZE)?);
        Ok(body)
    }
}

/// Typed chunk body: the closed set of variants the container may hold.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Main(RawBody),
    Pack(PackBody),
    Size(SizeBody),
    Voxels(VoxelsBody),
    Transform(TransformBody),
    Group(GroupBody),
    Shape(ShapeBody),
    Layer(LayerBody),
    Palette(PaletteBody),
    Material(MaterialBody),
    Lighting(LightingBody),
    Atmosphere(AtmosphereBody),
    Lens(LensBody),
    Post(PostBody),
    View(ViewBody),
    RenderObject(RawBody),
    RenderCamera(RawBody),
    Note(RawBody),
    IndexMap(IndexMapBody),
}

impl Body {
    /// Tag identifying this variant on the wire.
    pub fn tag(&self) -> ChunkTag {
        match self {
            Body::Main(_) => ChunkTag::Main,
            Body::Pack(_) => ChunkTag::Pack,
            Body::Size(_) => ChunkTag::Size,
            Body::Voxels(_) => ChunkTag::Voxels,
            Body::Transform(_) => ChunkTag::Transform,
            Body::Group(_) => ChunkTag::Group,
            Body::Shape(_) => ChunkTag::Shape,
            Body::Layer(_) => ChunkTag::Layer,
            Body::Palette(_) => ChunkTag::Palette,
            Body::Material(_) => ChunkTag::Material,
            Body::Lighting(_) => ChunkTag::Lighting,
            Body::Atmosphere(_) => ChunkTag::Atmosphere,
            Body::Lens(_) => ChunkTag::Lens,
            Body::Post(_) => ChunkTag::Post,
            Body::View(_) => ChunkTag::View,
            Body::RenderObject(_) => ChunkTag::RenderObject,
            Body::RenderCamera(_) => ChunkTag::RenderCamera,
            Body::Note(_) => ChunkTag::Note,
            Body::IndexMap(_) => ChunkTag::IndexMap,
        }
    }

    fn read(
        tag: ChunkTag,
        r: &mut ByteReader,
        body_len: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Self, FormatError> {
        let body_start = r.pos();
        Ok(match tag {
            ChunkTag::Main => Body::Main(RawBody::read(r, body_len)?),
            ChunkTag::Pack => Body::Pack(PackBody {
                models: r.read_i32()?,
            }),
            ChunkTag::Size => Body::Size(SizeBody {
                extent: IVec3::new(r.read_i32()?, r.read_i32()?, r.read_i32()?),
            }),
            ChunkTag::Voxels => {
                let count = r.read_len()?;
                let bytes = r.take(count * 4)?;
                Body::Voxels(VoxelsBody {
                    points: bytemuck::cast_slice(bytes).to_vec(),
                })
            }
            ChunkTag::Transform => Body::Transform(TransformBody::read(r)?),
            ChunkTag::Group => Body::Group(GroupBody::read(r)?),
            ChunkTag::Shape => Body::Shape(ShapeBody::read(r, body_start, body_len)?),
            ChunkTag::Layer => Body::Layer(LayerBody::read(r, body_start, body_len)?),
            ChunkTag::Palette => Body::Palette(PaletteBody::read(r)?),
            ChunkTag::Material => Body::Material(MaterialBody::read(r, diags)?),
            ChunkTag::Lighting => Body::Lighting(LightingBody::read(r)?),
            ChunkTag::Atmosphere => Body::Atmosphere(AtmosphereBody::read(r)?),
            ChunkTag::Lens => Body::Lens(LensBody::read(r)?),
            ChunkTag::Post => Body::Post(PostBody::read(r)?),
            ChunkTag::View => Body::View(ViewBody::read(r)?),
            ChunkTag::RenderObject => Body::RenderObject(RawBody::read(r, body_len)?),
            ChunkTag::RenderCamera => Body::RenderCamera(RawBody::read(r, body_len)?),
            ChunkTag::Note => Body::Note(RawBody::read(r, body_len)?),
            ChunkTag::IndexMap => Body::IndexMap(IndexMapBody::read(r)?),
        })
    }

    /// Declared body size: the exact byte count [`Self::write`] emits.
    pub fn size(&self) -> usize {
        match self {
            Body::Main(b) | Body::RenderObject(b) | Body::RenderCamera(b) | Body::Note(b) => {
                b.bytes.len()
            }
            Body::Pack(_) => 4,
            Body::Size(_) => 3 * 4,
            Body::Voxels(b) => 4 + 4 * b.points.len(),
            Body::Transform(b) => b.size(),
            Body::Group(b) => b.size(),
            Body::Shape(b) => b.size(),
            Body::Layer(b) => b.size(),
            Body::Palette(_) => PALETTE_SIZE * 4,
            Body::Material(b) => b.size(),
            Body::Lighting(b) => entries_size(&b.entries()),
            Body::Atmosphere(b) => entries_size(&b.entries()),
            Body::Lens(b) => entries_size(&b.entries()),
            Body::Post(b) => entries_size(&b.entries()),
            Body::View(b) => entries_size(&b.entries()),
            Body::IndexMap(_) => PALETTE_SIZE,
        }
    }

    fn write(&self, w: &mut ByteWriter) {
        match self {
            Body::Main(b) | Body::RenderObject(b) | Body::RenderCamera(b) | Body::Note(b) => {
                w.write_bytes(&b.bytes);
            }
            Body::Pack(b) => w.write_i32(b.models),
            Body::Size(b) => {
                w.write_i32(b.extent.x);
                w.write_i32(b.extent.y);
                w.write_i32(b.extent.z);
            }
            Body::Voxels(b) => {
                w.write_i32(b.points.len() as i32);
                w.write_bytes(bytemuck::cast_slice(&b.points));
            }
            Body::Transform(b) => b.write(w),
            Body::Group(b) => b.write(w),
            Body::Shape(b) => b.write(w),
            Body::Layer(b) => b.write(w),
            Body::Palette(b) => b.write(w),
            Body::Material(b) => b.write(w),
            Body::Lighting(b) => write_entries(w, &b.entries()),
            Body::Atmosphere(b) => write_entries(w, &b.entries()),
            Body::Lens(b) => write_entries(w, &b.entries()),
            Body::Post(b) => write_entries(w, &b.entries()),
            Body::View(b) => write_entries(w, &b.entries()),
            Body::IndexMap(b) => w.write_bytes(&b.map[..]),
        }
    }
}

/// One node of the decoded chunk tree. A parent exclusively owns its
/// children; the tree has no sharing and no cycles.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub body: Body,
    pub children: Vec<Chunk>,
}

impl Chunk {
    pub fn new(body: Body) -> Self {
        Self {
            body,
            children: Vec::new(),
        }
    }

    pub fn with_children(body: Body, children: Vec<Chunk>) -> Self {
        Self { body, children }
    }

    pub fn tag(&self) -> ChunkTag {
        self.body.tag()
    }

    /// First direct child with the given tag.
    pub fn find_child(&self, tag: ChunkTag) -> Option<&Chunk> {
        self.children.iter().find(|c| c.tag() == tag)
    }

    /// Decode one chunk, including its subtree.
    pub fn decode(r: &mut ByteReader, diags: &mut Vec<Diagnostic>) -> Result<Self, Error> {
        let raw = r.read_u32()?;
        let tag = ChunkTag::from_raw(raw)?;
        Self::decode_tagged(r, tag, diags)
    }

    fn decode_tagged(
        r: &mut ByteReader,
        tag: ChunkTag,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Self, Error> {
        let body_len = r.read_len()?;
        let children_len = r.read_len()?;

        let body_start = r.pos();
        let body = Body::read(tag, r, body_len, diags)?;
        let consumed = r.pos() - body_start;
        if consumed != body_len {
            log::warn!(
                "{} body misaligned: declared {body_len}, consumed {consumed}",
                tag.name()
            );
            diags.push(Diagnostic::BodyRealigned {
                tag: tag.name(),
                declared: body_len,
                consumed,
            });
            r.seek(body_start + body_len);
        }

        let children_start = r.pos();
        let mut chunk = Chunk::new(body);
        while r.pos() < children_start + children_len {
            chunk.children.push(Self::decode(r, diags)?);
        }
        let consumed = r.pos() - children_start;
        if consumed != children_len {
            log::warn!(
                "{} children misaligned: declared {children_len}, consumed {consumed}",
                tag.name()
            );
            diags.push(Diagnostic::ChildrenRealigned {
                tag: tag.name(),
                declared: children_len,
                consumed,
            });
            r.seek(children_start + children_len);
        }

        Ok(chunk)
    }

    /// Encode this chunk and its subtree. Lengths are recomputed from the
    /// variant size functions; a body writer that disagrees with its size
    /// function aborts with a [`ConsistencyError`].
    pub fn encode(&self, w: &mut ByteWriter) -> Result<(), Error> {
        let declared = self.body.size();
        w.write_u32(self.tag().raw());
        w.write_i32(declared as i32);
        w.write_i32(self.children_size() as i32);

        let body_start = w.len();
        self.body.write(w);
        let written = w.len() - body_start;
        if written != declared {
            return Err(ConsistencyError::BodySize {
                tag: self.tag().name(),
                declared,
                written,
            }
            .into());
        }

        for child in &self.children {
            child.encode(w)?;
        }
        Ok(())
    }

    /// Total wire size of the child list: per child a header plus its body
    /// and its own children, recursively.
    pub fn children_size(&self) -> usize {
        self.children
            .iter()
            .map(|c| HEADER_SIZE + c.body.size() + c.children_size())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(chunk: &Chunk) -> (Chunk, Vec<Diagnostic>) {
        let mut w = ByteWriter::new();
        chunk.encode(&mut w).expect("encode failed");
        let bytes = w.into_inner();
        assert_eq!(
            bytes.len(),
            HEADER_SIZE + chunk.body.size() + chunk.children_size()
        );

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        let decoded = Chunk::decode(&mut r, &mut diags).expect("decode failed");
        assert_eq!(r.remaining(), 0);
        (decoded, diags)
    }

    fn assert_clean_roundtrip(chunk: Chunk) {
        let (decoded, diags) = roundtrip(&chunk);
        assert_eq!(decoded, chunk);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn test_simple_bodies_roundtrip() {
        assert_clean_roundtrip(Chunk::new(Body::Pack(PackBody { models: 3 })));
        assert_clean_roundtrip(Chunk::new(Body::Size(SizeBody {
            extent: IVec3::new(4, 5, 6),
        })));
        assert_clean_roundtrip(Chunk::new(Body::Voxels(VoxelsBody {
            points: vec![VoxelPoint::new(0, 1, 2, 9), VoxelPoint::new(3, 3, 3, 255)],
        })));
        assert_clean_roundtrip(Chunk::new(Body::Note(RawBody {
            bytes: b"annotated".to_vec(),
        })));
        assert_clean_roundtrip(Chunk::new(Body::IndexMap(IndexMapBody::default())));
    }

    #[test]
    fn test_palette_roundtrip() {
        let mut body = PaletteBody::default();
        for (i, slot) in body.colors.iter_mut().enumerate() {
            *slot = Rgba::new(i as u8, (i / 2) as u8, 255 - i as u8, 255);
        }
        assert_clean_roundtrip(Chunk::new(Body::Palette(body)));
    }

    #[test]
    fn test_node_chunks_roundtrip() {
        let node = NodeHeader {
            id: 4,
            name: "wing".to_string(),
            hidden: true,
        };
        assert_clean_roundtrip(Chunk::new(Body::Transform(TransformBody {
            node: node.clone(),
            child: 5,
            reserved: -1,
            layer: 2,
            frames: 1,
            frame: TransformFrame {
                rotation: Some(40),
                translation: Some(Vec3::new(-3.0, 0.0, 12.0)),
            },
        })));
        assert_clean_roundtrip(Chunk::new(Body::Group(GroupBody {
            node: node.clone(),
            children: vec![2, 4, 6],
        })));
        assert_clean_roundtrip(Chunk::new(Body::Shape(ShapeBody {
            node,
            flag: 1,
            model: 0,
            rest: vec![0, 0, 0, 0],
        })));
    }

    #[test]
    fn test_default_fields_not_written() {
        // A default transform carries no dictionary entries at all: node id,
        // empty node dict, 4 ints, empty frame dict.
        let chunk = Chunk::new(Body::Transform(TransformBody::default()));
        assert_eq!(chunk.body.size(), 4 + 4 + 4 * 4 + 4);
        assert_clean_roundtrip(chunk);
    }

    #[test]
    fn test_transform_frame_canonical_order() {
        let chunk = Chunk::new(Body::Transform(TransformBody {
            frames: 1,
            frame: TransformFrame {
                rotation: Some(4),
                translation: Some(Vec3::new(1.0, 2.0, 3.0)),
            },
            ..Default::default()
        }));
        let mut w = ByteWriter::new();
        chunk.encode(&mut w).unwrap();
        let bytes = w.into_inner();
        let pos_r = bytes
            .windows(2)
            .position(|win| win == b"_r")
            .expect("_r missing");
        let pos_t = bytes
            .windows(2)
            .position(|win| win == b"_t")
            .expect("_t missing");
        assert!(pos_r < pos_t);
    }

    #[test]
    fn test_material_roundtrip_all_set() {
        assert_clean_roundtrip(Chunk::new(Body::Material(MaterialBody {
            id: 17,
            kind: MaterialKind::Metal,
            attrs: MaterialAttrs {
                roughness: 0.1,
                ior: 0.3,
                specular: 1.25,
                metal: 0.9,
                emission: 0.5,
                flux: 2.0,
                low_dynamic_range: 0.25,
                alpha: 0.5,
                transparency: 0.75,
                density: 0.05,
            },
        })));
    }

    #[test]
    fn test_material_weight_alias() {
        // Foreign writers emit the kind-specific weight under `_weight`.
        let mut w = ByteWriter::new();
        w.write_i32(9);
        w.write_i32(2);
        dict::write_entry(&mut w, "_type", "_glass");
        dict::write_entry(&mut w, "_weight", "0.5");
        let dict_bytes = w.into_inner();

        let mut w = ByteWriter::new();
        w.write_u32(ChunkTag::Material.raw());
        w.write_i32(dict_bytes.len() as i32);
        w.write_i32(0);
        w.write_bytes(&dict_bytes);
        let bytes = w.into_inner();

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        let chunk = Chunk::decode(&mut r, &mut diags).unwrap();
        let Body::Material(material) = &chunk.body else {
            panic!("not a material");
        };
        assert_eq!(material.kind, MaterialKind::Glass);
        assert_eq!(material.attrs.transparency, 0.5);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_material_unknown_key_warns() {
        let mut w = ByteWriter::new();
        w.write_i32(1);
        w.write_i32(2);
        dict::write_entry(&mut w, "_type", "_metal");
        dict::write_entry(&mut w, "_media", "1");
        let dict_bytes = w.into_inner();

        let mut w = ByteWriter::new();
        w.write_u32(ChunkTag::Material.raw());
        w.write_i32(dict_bytes.len() as i32);
        w.write_i32(0);
        w.write_bytes(&dict_bytes);
        let bytes = w.into_inner();

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        Chunk::decode(&mut r, &mut diags).unwrap();
        assert_eq!(diags.len(), 1);
        assert!(matches!(
            &diags[0],
            Diagnostic::UnknownMaterialKey { key, .. } if key == "_media"
        ));
    }

    #[test]
    fn test_node_unknown_key_fatal() {
        let mut w = ByteWriter::new();
        w.write_i32(0);
        w.write_i32(1);
        dict::write_entry(&mut w, "_zz", "1");
        let body = w.into_inner();

        let mut w = ByteWriter::new();
        w.write_u32(ChunkTag::Group.raw());
        w.write_i32((body.len() + 4) as i32);
        w.write_i32(0);
        w.write_bytes(&body);
        w.write_i32(0);
        let bytes = w.into_inner();

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        let err = Chunk::decode(&mut r, &mut diags).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::UnknownKey { chunk: "nGRP", .. })
        ));
    }

    #[test]
    fn test_render_settings_roundtrip() {
        assert_clean_roundtrip(Chunk::new(Body::Lighting(LightingBody {
            kind: "_sun".to_string(),
            intensity: 0.7,
            color: Rgba::new(255, 240, 220, 255),
            angle: Vec2::new(30.0, 245.0),
            area: 0.05,
        })));
        assert_clean_roundtrip(Chunk::new(Body::Lighting(LightingBody {
            kind: "_ambient".to_string(),
            intensity: 0.4,
            ..Default::default()
        })));
        assert_clean_roundtrip(Chunk::new(Body::Atmosphere(AtmosphereBody {
            kind: "_uniform".to_string(),
            density: 0.01,
            color: Rgba::new(200, 210, 255, 255),
            scattering: false,
        })));
        assert_clean_roundtrip(Chunk::new(Body::Lens(LensBody {
            fov: 45.0,
            depth_of_field: 0.5,
            exposure: 1.0,
            vignette: 0.1,
            stereo: 0.0,
            gamma: 2.2,
        })));
        assert_clean_roundtrip(Chunk::new(Body::Post(PostBody {
            kind: "_bloom".to_string(),
            mix: 0.5,
            scale: 2.0,
            threshold: 0.9,
        })));
        assert_clean_roundtrip(Chunk::new(Body::View(ViewBody {
            ground: Rgba::new(80, 80, 80, 255),
            background: Rgba::new(20, 20, 30, 255),
            edge: Rgba::new(0, 0, 0, 255),
        })));
    }

    #[test]
    fn test_tree_with_children() {
        let root = Chunk::with_children(
            Body::Main(RawBody::default()),
            vec![
                Chunk::new(Body::Size(SizeBody {
                    extent: IVec3::new(2, 2, 2),
                })),
                Chunk::new(Body::Voxels(VoxelsBody {
                    points: vec![VoxelPoint::new(0, 0, 0, 1)],
                })),
            ],
        );
        // Per child: header + body; neither child has grandchildren.
        assert_eq!(root.children_size(), (12 + 12) + (12 + 8));
        assert_clean_roundtrip(root);
    }

    #[test]
    fn test_body_realignment_recovers() {
        // A SIZE chunk that declares two bytes more body than its reader
        // consumes; decode must seek to the declared boundary and record
        // exactly one diagnostic.
        let mut w = ByteWriter::new();
        w.write_u32(ChunkTag::Size.raw());
        w.write_i32(14);
        w.write_i32(0);
        w.write_i32(4);
        w.write_i32(4);
        w.write_i32(4);
        w.write_u8(0xAB);
        w.write_u8(0xCD);
        let bytes = w.into_inner();

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        let chunk = Chunk::decode(&mut r, &mut diags).unwrap();
        assert_eq!(
            chunk.body,
            Body::Size(SizeBody {
                extent: IVec3::new(4, 4, 4)
            })
        );
        assert_eq!(
            diags,
            vec![Diagnostic::BodyRealigned {
                tag: "SIZE",
                declared: 14,
                consumed: 12,
            }]
        );
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_children_realignment_recovers() {
        // MAIN declares fewer children bytes than its one child actually
        // spans; the loop overshoots, seeks back to the declared boundary,
        // and records a diagnostic.
        let mut child = ByteWriter::new();
        Chunk::new(Body::Pack(PackBody { models: 1 }))
            .encode(&mut child)
            .unwrap();
        let child = child.into_inner();

        let mut w = ByteWriter::new();
        w.write_u32(ChunkTag::Main.raw());
        w.write_i32(0);
        w.write_i32(child.len() as i32 - 2);
        w.write_bytes(&child);
        let bytes = w.into_inner();

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        let chunk = Chunk::decode(&mut r, &mut diags).unwrap();
        assert_eq!(chunk.children.len(), 1);
        assert_eq!(
            diags,
            vec![Diagnostic::ChildrenRealigned {
                tag: "MAIN",
                declared: child.len() - 2,
                consumed: child.len(),
            }]
        );
        assert_eq!(r.remaining(), 2);
    }

    #[test]
    fn test_legacy_material_fails_fast() {
        let mut w = ByteWriter::new();
        w.write_u32(crate::vox::tag::fourcc(b"MATT"));
        w.write_i32(0);
        w.write_i32(0);
        let bytes = w.into_inner();

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        let err = Chunk::decode(&mut r, &mut diags).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::LegacyMaterial)));
    }

    #[test]
    fn test_unknown_tag_fails_with_raw_value() {
        let mut w = ByteWriter::new();
        w.write_u32(crate::vox::tag::fourcc(b"QQQQ"));
        w.write_i32(0);
        w.write_i32(0);
        let bytes = w.into_inner();

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        let err = Chunk::decode(&mut r, &mut diags).unwrap_err();
        match err {
            Error::Format(FormatError::UnknownTag { raw, .. }) => {
                assert_eq!(raw, crate::vox::tag::fourcc(b"QQQQ"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_children_loop_realigns_after_realigned_child() {
        // Child body realignment must not corrupt the parent's child loop:
        // the second child still decodes.
        let mut child1 = ByteWriter::new();
        child1.write_u32(ChunkTag::Size.raw());
        child1.write_i32(13);
        child1.write_i32(0);
        child1.write_i32(1);
        child1.write_i32(1);
        child1.write_i32(1);
        child1.write_u8(0xFF);
        let child1 = child1.into_inner();

        let mut child2 = ByteWriter::new();
        Chunk::new(Body::Pack(PackBody { models: 2 }))
            .encode(&mut child2)
            .unwrap();
        let child2 = child2.into_inner();

        let mut w = ByteWriter::new();
        w.write_u32(ChunkTag::Main.raw());
        w.write_i32(0);
        w.write_i32((child1.len() + child2.len()) as i32);
        w.write_bytes(&child1);
        w.write_bytes(&child2);
        let bytes = w.into_inner();

        let mut diags = Vec::new();
        let mut r = ByteReader::new(&bytes);
        let chunk = Chunk::decode(&mut r, &mut diags).unwrap();
        assert_eq!(chunk.children.len(), 2);
        assert_eq!(chunk.children[1].body, Body::Pack(PackBody { models: 2 }));
        assert_eq!(diags.len(), 1);
    }
}
