//! PE32 image layout
//!
//! ```text
//! 0x000  DOS header, PE signature, COFF and optional headers, section table
//! 0x200  .text   IAT | CLI header | method bodies | metadata | imports | entry stub
//!        .reloc  one base relocation block for the entry stub
//! ```

use crate::writer::{align_up, ByteWriter};

/// Preferred load address
pub const IMAGE_BASE: u32 = 0x0040_0000;
/// RVA of `.text`
pub const TEXT_RVA: u32 = 0x2000;
/// Offset of the first method body within `.text`
pub const METHOD_BODIES_OFFSET: u32 = IAT_SIZE + CLI_HEADER_SIZE;

const SECTION_ALIGNMENT: u32 = 0x2000;
const FILE_ALIGNMENT: u32 = 0x200;
const HEADERS_SIZE: u32 = 0x200;
const PE_OFFSET: usize = 0x80;
const IAT_SIZE: u32 = 8;
const CLI_HEADER_SIZE: u32 = 72;
const IMPORT_DIRECTORY_SIZE: u32 = 40;
const RELOC_BLOCK_SIZE: u32 = 12;
const OPTIONAL_HEADER_SIZE: u16 = 0xE0;

const IMAGE_FILE_MACHINE_I386: u16 = 0x014C;
const IMAGE_FILE_EXECUTABLE_32BIT: u16 = 0x0102;
const SUBSYSTEM_CONSOLE: u16 = 3;
// DYNAMIC_BASE | NX_COMPAT | NO_SEH | TERMINAL_SERVER_AWARE
const DLL_CHARACTERISTICS: u16 = 0x8540;
const TEXT_CHARACTERISTICS: u32 = 0x6000_0020;
const RELOC_CHARACTERISTICS: u32 = 0x4200_0040;
const COMIMAGE_FLAGS_ILONLY: u32 = 1;
const IMAGE_REL_BASED_HIGHLOW: u16 = 3;

/// RVA of a method body written at `offset` within the body area
pub fn method_rva(offset: usize) -> u32 {
    TEXT_RVA + METHOD_BODIES_OFFSET + offset as u32
}

/// Positions within `.text`, relative to its start
#[derive(Debug, Clone, Copy)]
struct TextLayout {
    metadata: u32,
    metadata_size: u32,
    import_directory: u32,
    lookup_table: u32,
    hint_name: u32,
    dll_name: u32,
    entry_stub: u32,
    size: u32,
}

impl TextLayout {
    fn new(bodies_size: usize, metadata_size: usize) -> Self {
        let metadata = align_up(METHOD_BODIES_OFFSET as usize + bodies_size, 4) as u32;
        let metadata_size = metadata_size as u32;
        let import_directory = align_up((metadata + metadata_size) as usize, 4) as u32;
        let lookup_table = import_directory + IMPORT_DIRECTORY_SIZE;
        let hint_name = lookup_table + 8;
        // hint (2) + "_CorExeMain\0" (12)
        let dll_name = hint_name + 14;
        // "mscoree.dll\0"; the jump operand must be 4-aligned
        let mut entry_stub = dll_name + 12;
        while (entry_stub + 2) % 4 != 0 {
            entry_stub += 1;
        }
        Self {
            metadata,
            metadata_size,
            import_directory,
            lookup_table,
            hint_name,
            dll_name,
            entry_stub,
            size: entry_stub + 6,
        }
    }

    fn rva(&self, offset: u32) -> u32 {
        TEXT_RVA + offset
    }
}

/// Lay out a complete image around already encoded bodies and metadata
pub fn layout(bodies: &[u8], metadata: &[u8], entry_point_token: u32) -> Vec<u8> {
    let text = TextLayout::new(bodies.len(), metadata.len());
    let text_raw_size = align_up(text.size as usize, FILE_ALIGNMENT as usize) as u32;
    let reloc_rva = align_up((TEXT_RVA + text.size) as usize, SECTION_ALIGNMENT as usize) as u32;
    let reloc_raw_size = FILE_ALIGNMENT;
    let image_size =
        align_up((reloc_rva + RELOC_BLOCK_SIZE) as usize, SECTION_ALIGNMENT as usize) as u32;
    let stub_operand_rva = text.rva(text.entry_stub + 2);

    let mut w = ByteWriter::with_capacity((HEADERS_SIZE + text_raw_size + reloc_raw_size) as usize);

    // ===== DOS header =====
    w.emit_bytes(b"MZ");
    w.pad_to(0x3C);
    w.emit_u32(PE_OFFSET as u32);
    w.pad_to(PE_OFFSET);

    // ===== COFF header =====
    w.emit_bytes(b"PE\0\0");
    w.emit_u16(IMAGE_FILE_MACHINE_I386);
    w.emit_u16(2);
    w.emit_u32(0);
    w.emit_u32(0);
    w.emit_u32(0);
    w.emit_u16(OPTIONAL_HEADER_SIZE);
    w.emit_u16(IMAGE_FILE_EXECUTABLE_32BIT);

    // ===== Optional header =====
    w.emit_u16(0x010B);
    w.emit_u8(8);
    w.emit_u8(0);
    w.emit_u32(text_raw_size);
    w.emit_u32(reloc_raw_size);
    w.emit_u32(0);
    w.emit_u32(text.rva(text.entry_stub));
    w.emit_u32(TEXT_RVA);
    w.emit_u32(reloc_rva);
    w.emit_u32(IMAGE_BASE);
    w.emit_u32(SECTION_ALIGNMENT);
    w.emit_u32(FILE_ALIGNMENT);
    w.emit_u16(4);
    w.emit_u16(0);
    w.emit_u16(0);
    w.emit_u16(0);
    w.emit_u16(4);
    w.emit_u16(0);
    w.emit_u32(0);
    w.emit_u32(image_size);
    w.emit_u32(HEADERS_SIZE);
    w.emit_u32(0);
    w.emit_u16(SUBSYSTEM_CONSOLE);
    w.emit_u16(DLL_CHARACTERISTICS);
    w.emit_u32(0x0010_0000);
    w.emit_u32(0x1000);
    w.emit_u32(0x0010_0000);
    w.emit_u32(0x1000);
    w.emit_u32(0);
    w.emit_u32(16);

    let mut directories = [(0u32, 0u32); 16];
    directories[1] = (text.rva(text.import_directory), IMPORT_DIRECTORY_SIZE);
    directories[5] = (reloc_rva, RELOC_BLOCK_SIZE);
    directories[12] = (TEXT_RVA, IAT_SIZE);
    directories[14] = (text.rva(IAT_SIZE), CLI_HEADER_SIZE);
    for (rva, size) in directories {
        w.emit_u32(rva);
        w.emit_u32(size);
    }

    // ===== Section table =====
    section_header(&mut w, b".text\0\0\0", text.size, TEXT_RVA, text_raw_size, HEADERS_SIZE, TEXT_CHARACTERISTICS);
    section_header(
        &mut w,
        b".reloc\0\0",
        RELOC_BLOCK_SIZE,
        reloc_rva,
        reloc_raw_size,
        HEADERS_SIZE + text_raw_size,
        RELOC_CHARACTERISTICS,
    );
    w.pad_to(HEADERS_SIZE as usize);

    // ===== .text =====
    let base = w.offset();
    w.emit_u32(text.rva(text.hint_name));
    w.emit_u32(0);

    w.emit_u32(CLI_HEADER_SIZE);
    w.emit_u16(2);
    w.emit_u16(5);
    w.emit_u32(text.rva(text.metadata));
    w.emit_u32(text.metadata_size);
    w.emit_u32(COMIMAGE_FLAGS_ILONLY);
    w.emit_u32(entry_point_token);
    // resources, strong name, code manager, vtable fixups, export jumps,
    // managed native header
    for _ in 0..6 {
        w.emit_u64(0);
    }

    w.emit_bytes(bodies);
    w.pad_to(base + text.metadata as usize);
    w.emit_bytes(metadata);
    w.pad_to(base + text.import_directory as usize);

    w.emit_u32(text.rva(text.lookup_table));
    w.emit_u32(0);
    w.emit_u32(0);
    w.emit_u32(text.rva(text.dll_name));
    w.emit_u32(TEXT_RVA);
    w.pad_to(base + text.lookup_table as usize);

    w.emit_u32(text.rva(text.hint_name));
    w.emit_u32(0);
    w.emit_u16(0);
    w.emit_bytes(b"_CorExeMain\0");
    w.emit_bytes(b"mscoree.dll\0");
    w.pad_to(base + text.entry_stub as usize);

    w.emit_bytes(&[0xFF, 0x25]);
    w.emit_u32(IMAGE_BASE + TEXT_RVA);
    w.pad_to(base + text_raw_size as usize);

    // ===== .reloc =====
    w.emit_u32(stub_operand_rva & !0xFFF);
    w.emit_u32(RELOC_BLOCK_SIZE);
    w.emit_u16((IMAGE_REL_BASED_HIGHLOW << 12) | (stub_operand_rva & 0xFFF) as u16);
    w.emit_u16(0);
    w.pad_to((HEADERS_SIZE + text_raw_size + reloc_raw_size) as usize);

    tracing::debug!(
        image_size = w.offset(),
        code = bodies.len(),
        metadata = metadata.len(),
        "laid out PE image"
    );
    w.into_bytes()
}

fn section_header(
    w: &mut ByteWriter,
    name: &[u8; 8],
    virtual_size: u32,
    rva: u32,
    raw_size: u32,
    raw_offset: u32,
    characteristics: u32,
) {
    w.emit_bytes(name);
    w.emit_u32(virtual_size);
    w.emit_u32(rva);
    w.emit_u32(raw_size);
    w.emit_u32(raw_offset);
    w.emit_u32(0);
    w.emit_u32(0);
    w.emit_u16(0);
    w.emit_u16(0);
    w.emit_u32(characteristics);
}
