use std::fmt::Display;
use std::io::{self, Read, Seek, Write};

mod endian;
mod error;
mod ifd;
mod tag;

pub use endian::Endian;
pub use error::TiffError;
pub use ifd::Ifd;
pub use tag::{Tag, TagData, TagId, TagType, TagValue};

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Variant {
    Normal,
    Big,
}

impl Variant {
    fn read_offset<R: Read>(&self, endian: Endian, stream: &mut R) -> io::Result<u64> {
        match self {
            Variant::Normal => endian.read::<4, u32>(stream).map(|v| v as u64),
            Variant::Big => endian.read(stream),
        }
    }

    fn encode_offset(&self, endian: Endian, value: u64) -> Result<Vec<u8>, TiffError> {
        match self {
            Variant::Normal => {
                let v = u32::try_from(value).map_err(|_| TiffError::OffsetOverflow(value))?;
                Ok(endian.encode(v).to_vec())
            }
            Variant::Big => Ok(endian.encode(value).to_vec()),
        }
    }

    const fn offset_bytesize(&self) -> usize {
        match self {
            Variant::Normal => 4,
            Variant::Big => 8,
        }
    }

    const fn header_bytesize(&self) -> u64 {
        match self {
            Variant::Normal => 8,
            Variant::Big => 16,
        }
    }

    /// Size of an IFD with `n` entries, including the count and next offset.
    const fn ifd_bytesize(&self, n: u64) -> u64 {
        match self {
            Variant::Normal => 2 + 12 * n + 4,
            Variant::Big => 8 + 20 * n + 8,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tiff {
    pub endian: Endian,
    pub variant: Variant,
    pub ifds: Vec<Ifd>,
}

impl Tiff {
    pub fn new(endian: Endian, variant: Variant) -> Self {
        Self {
            endian,
            variant,
            ifds: vec![Ifd::default()],
        }
    }

    pub fn open<R: Read + Seek>(stream: &mut R) -> Result<Self, TiffError> {
        // TIFF Header
        let mut buf = [0; 4];
        stream.read_exact(&mut buf)?;

        let endian = match &buf[..2] {
            b"II" => Endian::Little,
            b"MM" => Endian::Big,
            _ => return Err(TiffError::BadMagicBytes),
        };

        let variant = match &buf[2..4] {
            b"\0*" | b"*\0" => Variant::Normal,
            b"\0+" | b"+\0" => Variant::Big,
            _ => return Err(TiffError::BadMagicBytes),
        };

        if Variant::Big == variant {
            // BigTIFFs have 4 extra bytes in the header
            let _offset_bytesize: u16 = endian.read(stream)?; // 0x0008
            let _: u16 = endian.read(stream)?; // 0x0000
        }

        // IFDs
        let mut ifds = vec![];
        let mut seen = vec![];
        let mut ifd_offset = variant.read_offset(endian, stream)?;
        while ifd_offset != 0 && !seen.contains(&ifd_offset) {
            seen.push(ifd_offset);
            let (ifd, next_offset) = Ifd::parse(stream, ifd_offset, endian, variant)?;
            ifd_offset = next_offset;
            ifds.push(ifd);
        }

        Ok(Self {
            endian,
            variant,
            ifds,
        })
    }

    pub fn ifd0(&self) -> Result<&Ifd, TiffError> {
        self.ifds.first().ok_or(TiffError::NoIfd)
    }

    pub fn ifd0_mut(&mut self) -> Result<&mut Ifd, TiffError> {
        self.ifds.first_mut().ok_or(TiffError::NoIfd)
    }

    /// Writes the first IFD as a single-image TIFF.
    ///
    /// Layout is header, image chunks, IFD, then tag values that overflow
    /// their entry. Chunk offsets and byte counts are filled in here under
    /// `offsets_id`/`byte_counts_id` (strip or tile tags).
    pub fn encode<W: Write>(
        &self,
        writer: &mut W,
        chunks: &[Vec<u8>],
        offsets_id: TagId,
        byte_counts_id: TagId,
    ) -> Result<(), TiffError> {
        let endian = self.endian;
        let variant = self.variant;
        let mut ifd = self.ifd0()?.clone();

        // Chunk placement
        let mut cursor = variant.header_bytesize();
        let mut offsets = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            offsets.push(cursor);
            cursor += chunk.len() as u64;
        }
        let byte_counts: Vec<u64> = chunks.iter().map(|c| c.len() as u64).collect();
        match variant {
            Variant::Normal => {
                let narrow = |values: &[u64]| {
                    values
                        .iter()
                        .map(|v| u32::try_from(*v).map_err(|_| TiffError::OffsetOverflow(*v)))
                        .collect::<Result<Vec<u32>, TiffError>>()
                };
                ifd.set_tag(offsets_id, TagData::Long(narrow(&offsets)?), endian);
                ifd.set_tag(byte_counts_id, TagData::Long(narrow(&byte_counts)?), endian);
            }
            Variant::Big => {
                ifd.set_tag(offsets_id, TagData::Long8(offsets), endian);
                ifd.set_tag(byte_counts_id, TagData::Long8(byte_counts), endian);
            }
        }

        // IFD entries, with oversized values spilled after the directory
        let padding = cursor % 2;
        let ifd_offset = cursor + padding;
        let overflow_offset = ifd_offset + variant.ifd_bytesize(ifd.0.len() as u64);
        let offset_size = variant.offset_bytesize();
        let mut entries = vec![];
        let mut overflow = vec![];
        for tag in ifd.0.iter() {
            entries.extend(endian.encode(tag.code));
            entries.extend(endian.encode(u16::from(tag.datatype)));
            entries.extend(variant.encode_offset(endian, tag.count as u64)?);
            if tag.data.len() > offset_size {
                let at = overflow_offset + overflow.len() as u64;
                entries.extend(variant.encode_offset(endian, at)?);
                overflow.extend_from_slice(&tag.data);
                if overflow.len() % 2 == 1 {
                    overflow.push(0);
                }
            } else {
                let mut inline = tag.data.clone();
                inline.resize(offset_size, 0);
                entries.extend(inline);
            }
        }

        // Header
        writer.write_all(endian.magic())?;
        match variant {
            Variant::Normal => endian.write(writer, 42u16)?,
            Variant::Big => {
                endian.write(writer, 43u16)?;
                endian.write(writer, 8u16)?;
                endian.write(writer, 0u16)?;
            }
        }
        writer.write_all(&variant.encode_offset(endian, ifd_offset)?)?;

        // Body
        for chunk in chunks {
            writer.write_all(chunk)?;
        }
        writer.write_all(&vec![0; padding as usize])?;
        match variant {
            Variant::Normal => {
                let n = u16::try_from(ifd.0.len()).map_err(|_| TiffError::BadTag(offsets_id))?;
                endian.write(writer, n)?
            }
            Variant::Big => endian.write(writer, ifd.0.len() as u64)?,
        }
        writer.write_all(&entries)?;
        writer.write_all(&variant.encode_offset(endian, 0)?)?;
        writer.write_all(&overflow)?;
        Ok(())
    }
}

impl Display for Tiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "TIFF ({:?} endian, {:?}):", self.endian, self.variant)?;
        for (i, ifd) in self.ifds.iter().enumerate() {
            writeln!(f, "IFD {i}:")?;
            for tag in ifd.0.iter() {
                writeln!(f, "\t{}", tag)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample(endian: Endian, variant: Variant) -> Vec<u8> {
        let mut tiff = Tiff::new(endian, variant);
        let ifd = tiff.ifd0_mut().unwrap();
        ifd.set_tag(TagId::ImageWidth, TagData::from_long(3), endian);
        ifd.set_tag(TagId::ImageHeight, TagData::from_long(1), endian);
        ifd.set_tag(TagId::BitsPerSample, TagData::from_short(8), endian);
        ifd.set_tag(
            TagId::ModelPixelScale,
            TagData::Double(vec![30.0, 30.0, 0.0]),
            endian,
        );
        ifd.set_tag(TagId::GDALNoData, TagData::from_string("0"), endian);
        let mut bytes = vec![];
        tiff.encode(
            &mut bytes,
            &[vec![1, 2, 3]],
            TagId::StripOffsets,
            TagId::StripByteCounts,
        )
        .unwrap();
        bytes
    }

    #[test]
    fn test_encode_then_open() {
        for endian in [Endian::Little, Endian::Big] {
            for variant in [Variant::Normal, Variant::Big] {
                let bytes = sample(endian, variant);
                let tiff = Tiff::open(&mut Cursor::new(&bytes)).unwrap();
                assert_eq!(tiff.endian, endian);
                assert_eq!(tiff.variant, variant);
                assert_eq!(tiff.ifds.len(), 1);

                let ifd = tiff.ifd0().unwrap();
                assert_eq!(ifd.get_tag_value::<u32>(TagId::ImageWidth).unwrap(), 3);
                assert_eq!(
                    ifd.get_tag_values::<f64>(TagId::ModelPixelScale).unwrap(),
                    vec![30.0, 30.0, 0.0]
                );
                assert_eq!(
                    ifd.get_tag(TagId::GDALNoData).unwrap().try_to_string(),
                    Some("0".to_string())
                );

                let offset = ifd.get_tag_value::<u64>(TagId::StripOffsets).unwrap() as usize;
                assert_eq!(&bytes[offset..offset + 3], &[1, 2, 3]);
            }
        }
    }

    #[test]
    fn test_bad_magic_bytes() {
        let result = Tiff::open(&mut Cursor::new(b"PK\x03\x04xxxx".to_vec()));
        assert!(matches!(result, Err(TiffError::BadMagicBytes)));
    }

    #[test]
    fn test_set_tag_keeps_codes_sorted() {
        let mut ifd = Ifd::default();
        ifd.set_tag(TagId::Compression, TagData::from_short(8), Endian::Little);
        ifd.set_tag(TagId::ImageWidth, TagData::from_long(10), Endian::Little);
        ifd.set_tag(TagId::Compression, TagData::from_short(1), Endian::Little);
        let codes: Vec<u16> = ifd.0.iter().map(|t| t.code).collect();
        assert_eq!(codes, vec![0x0100, 0x0103]);
        assert_eq!(ifd.get_tag_value::<u16>(TagId::Compression).unwrap(), 1);
    }
}
