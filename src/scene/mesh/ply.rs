//! Reader for Stanford PLY meshes.
//!
//! Supports ascii and both binary encodings. Only the `vertex` and `face` elements are
//! interpreted, everything else is parsed and skipped. Polygons are triangulated as fans.

use std::{fs, path::Path, str::FromStr};

use itertools::Itertools as _;

use super::{MeshLoadError, TriangleMesh};
use crate::geometry::{FloatType, Triangle, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Clone, Debug)]
struct Property {
    name: String,
    kind: PropertyKind,
}

#[derive(Clone, Debug)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Clone, Debug)]
struct Header {
    format: Format,
    elements: Vec<Element>,
}

fn ply_error(message: impl Into<String>) -> MeshLoadError {
    MeshLoadError::PlyParseError(message.into())
}

impl FromStr for ScalarType {
    type Err = MeshLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "char" | "int8" => ScalarType::I8,
            "uchar" | "uint8" => ScalarType::U8,
            "short" | "int16" => ScalarType::I16,
            "ushort" | "uint16" => ScalarType::U16,
            "int" | "int32" => ScalarType::I32,
            "uint" | "uint32" => ScalarType::U32,
            "float" | "float32" => ScalarType::F32,
            "double" | "float64" => ScalarType::F64,
            other => return Err(ply_error(format!("Unknown property type {other:?}"))),
        })
    }
}

impl TriangleMesh {
    pub fn from_ply(p: impl AsRef<Path>) -> Result<TriangleMesh, MeshLoadError> {
        let content = fs::read(p)?;
        Self::from_ply_bytes(&content)
    }

    pub fn from_ply_bytes(content: &[u8]) -> Result<TriangleMesh, MeshLoadError> {
        let (header, body) = parse_header(content)?;
        match header.format {
            Format::Ascii => read_body(&header, &mut AsciiReader::new(body)?),
            Format::BinaryLittleEndian => read_body(
                &header,
                &mut BinaryReader {
                    data: body,
                    big_endian: false,
                },
            ),
            Format::BinaryBigEndian => read_body(
                &header,
                &mut BinaryReader {
                    data: body,
                    big_endian: true,
                },
            ),
        }
    }
}

fn read_body<R: ValueReader>(header: &Header, reader: &mut R) -> Result<TriangleMesh, MeshLoadError> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::new();
    let mut skipped_polygons = 0usize;

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => read_vertices(element, reader, &mut positions, &mut normals)?,
            "face" => skipped_polygons += read_faces(element, reader, &mut faces)?,
            _ => {
                for _ in 0..element.count {
                    read_record(element, reader)?;
                }
            }
        }
    }

    if skipped_polygons > 0 {
        log::warn!("Skipped {skipped_polygons} faces with less than three vertices");
    }

    let normals = normals.into_iter().collect::<Option<Vec<_>>>();
    TriangleMesh::new(positions, normals, faces)
}

/// Splits the file into parsed header and the remaining body bytes.
fn parse_header(content: &[u8]) -> Result<(Header, &[u8]), MeshLoadError> {
    const END: &[u8] = b"end_header";

    let end = content
        .windows(END.len())
        .position(|w| w == END)
        .ok_or_else(|| ply_error("Missing end_header"))?;
    let body_start = content[end..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(content.len(), |newline| end + newline + 1);

    let header_text = std::str::from_utf8(&content[..end])
        .map_err(|_| ply_error("Header is not valid text"))?;

    let mut lines = header_text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("ply") {
        return Err(ply_error("Missing ply magic"));
    }

    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();

    for line in lines {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("format") => {
                format = Some(match tokens.next() {
                    Some("ascii") => Format::Ascii,
                    Some("binary_little_endian") => Format::BinaryLittleEndian,
                    Some("binary_big_endian") => Format::BinaryBigEndian,
                    other => return Err(ply_error(format!("Unknown format {other:?}"))),
                });
            }
            Some("element") => {
                let (name, count) = tokens
                    .next_tuple()
                    .ok_or_else(|| ply_error(format!("Malformed element line {line:?}")))?;
                let count = count
                    .parse()
                    .map_err(|_| ply_error(format!("Invalid element count in {line:?}")))?;
                elements.push(Element {
                    name: name.to_owned(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| ply_error("Property before any element"))?;
                let tokens = tokens.collect_vec();
                let property = match tokens.as_slice() {
                    ["list", count, item, name] => Property {
                        name: (*name).to_owned(),
                        kind: PropertyKind::List {
                            count: count.parse()?,
                            item: item.parse()?,
                        },
                    },
                    [ty, name] => Property {
                        name: (*name).to_owned(),
                        kind: PropertyKind::Scalar(ty.parse()?),
                    },
                    _ => return Err(ply_error(format!("Malformed property line {line:?}"))),
                };
                element.properties.push(property);
            }
            Some("comment" | "obj_info") => {}
            Some(other) => return Err(ply_error(format!("Unknown header keyword {other:?}"))),
            None => {}
        }
    }

    let format = format.ok_or_else(|| ply_error("Missing format line"))?;
    Ok((Header { format, elements }, &content[body_start..]))
}

/// Source of property values in the body of the file.
trait ValueReader {
    fn read(&mut self, ty: ScalarType) -> Result<f64, MeshLoadError>;
}

struct AsciiReader<'a> {
    tokens: std::str::SplitAsciiWhitespace<'a>,
}

impl<'a> AsciiReader<'a> {
    fn new(body: &'a [u8]) -> Result<Self, MeshLoadError> {
        let text = std::str::from_utf8(body).map_err(|_| ply_error("Body is not valid text"))?;
        Ok(AsciiReader {
            tokens: text.split_ascii_whitespace(),
        })
    }
}

impl ValueReader for AsciiReader<'_> {
    fn read(&mut self, _ty: ScalarType) -> Result<f64, MeshLoadError> {
        let token = self
            .tokens
            .next()
            .ok_or_else(|| ply_error("Unexpected end of file"))?;
        token
            .parse()
            .map_err(|_| ply_error(format!("Invalid number {token:?}")))
    }
}

struct BinaryReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl BinaryReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], MeshLoadError> {
        let (head, rest) = self
            .data
            .split_first_chunk::<N>()
            .ok_or_else(|| ply_error("Unexpected end of file"))?;
        self.data = rest;
        Ok(*head)
    }
}

impl ValueReader for BinaryReader<'_> {
    fn read(&mut self, ty: ScalarType) -> Result<f64, MeshLoadError> {
        macro_rules! read_as {
            ($t:ty) => {{
                let bytes = self.take()?;
                let value = if self.big_endian {
                    <$t>::from_be_bytes(bytes)
                } else {
                    <$t>::from_le_bytes(bytes)
                };
                value as f64
            }};
        }

        Ok(match ty {
            ScalarType::I8 => read_as!(i8),
            ScalarType::U8 => read_as!(u8),
            ScalarType::I16 => read_as!(i16),
            ScalarType::U16 => read_as!(u16),
            ScalarType::I32 => read_as!(i32),
            ScalarType::U32 => read_as!(u32),
            ScalarType::F32 => read_as!(f32),
            ScalarType::F64 => read_as!(f64),
        })
    }
}

/// Value of a single property of one record.
enum Value {
    Scalar(f64),
    List(Vec<f64>),
}

fn read_record(
    element: &Element,
    reader: &mut impl ValueReader,
) -> Result<Vec<Value>, MeshLoadError> {
    element
        .properties
        .iter()
        .map(|property| match property.kind {
            PropertyKind::Scalar(ty) => Ok(Value::Scalar(reader.read(ty)?)),
            PropertyKind::List { count, item } => {
                let count = to_index(reader.read(count)?)?;
                let items = (0..count)
                    .map(|_| reader.read(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(items))
            }
        })
        .collect()
}

fn to_index(value: f64) -> Result<usize, MeshLoadError> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(ply_error(format!("Invalid index {value}")));
    }
    Ok(value as usize)
}

fn property_position(element: &Element, name: &str) -> Option<usize> {
    element.properties.iter().position(|p| p.name == name)
}

fn read_vertices(
    element: &Element,
    reader: &mut impl ValueReader,
    positions: &mut Vec<WorldPoint>,
    normals: &mut Vec<Option<WorldVector>>,
) -> Result<(), MeshLoadError> {
    let find_all = |names: [&str; 3]| -> Option<[usize; 3]> {
        let [a, b, c] = names.map(|name| property_position(element, name));
        Some([a?, b?, c?])
    };
    let position_indices =
        find_all(["x", "y", "z"]).ok_or_else(|| ply_error("Vertex element is missing x, y or z"))?;
    let normal_indices = find_all(["nx", "ny", "nz"]);

    for _ in 0..element.count {
        let record = read_record(element, reader)?;
        let scalar = |index: usize| match record[index] {
            Value::Scalar(v) => Ok(v as FloatType),
            Value::List(_) => Err(ply_error("Vertex coordinate is a list")),
        };
        let [x, y, z] = position_indices;
        positions.push(WorldPoint::new(scalar(x)?, scalar(y)?, scalar(z)?));
        let normal = match normal_indices {
            Some([nx, ny, nz]) => {
                WorldVector::new(scalar(nx)?, scalar(ny)?, scalar(nz)?).try_normalize(0.0)
            }
            None => None,
        };
        normals.push(normal);
    }

    Ok(())
}

/// Reads faces and fan triangulates them, returns number of skipped degenerate polygons.
fn read_faces(
    element: &Element,
    reader: &mut impl ValueReader,
    faces: &mut Vec<Triangle<usize>>,
) -> Result<usize, MeshLoadError> {
    let index_property = property_position(element, "vertex_indices")
        .or_else(|| property_position(element, "vertex_index"))
        .ok_or_else(|| ply_error("Face element is missing vertex_indices"))?;

    let mut skipped = 0;
    for _ in 0..element.count {
        let record = read_record(element, reader)?;
        let Value::List(indices) = &record[index_property] else {
            return Err(ply_error("Face vertex_indices is not a list"));
        };
        let indices = indices
            .iter()
            .map(|&i| to_index(i))
            .collect::<Result<Vec<_>, _>>()?;

        let Some((&first, rest)) = indices.split_first() else {
            skipped += 1;
            continue;
        };
        if rest.len() < 2 {
            skipped += 1;
            continue;
        }
        faces.extend(
            rest.iter()
                .tuple_windows()
                .map(|(&b, &c)| Triangle::new(first, b, c)),
        );
    }

    Ok(skipped)
}
