use crate::codec::header::MessageType;
use crate::codec::xdr::{put_opaque, put_string, put_u32, put_u64, Reader};
use crate::device::DeviceId;
use crate::error::{BepError, Result};
use crate::model::{
    file_flags, BlockInfo, ClusterConfig, ClusterConfigDevice, ClusterConfigFolder,
    ClusterConfigOption, FileInfo, IndexMessage,
};

/// A block-data request, as sent by the device that wants the bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub folder: String,
    pub name: String,
    pub offset: u64,
    pub size: u32,
    pub hash: Vec<u8>,
}

/// The reply to a `Request`; `data` is empty when the block could not be
/// served (see the `Resource` error kind).
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub data: Vec<u8>,
}

/// Sent as the final message on a connection before it closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Close {
    pub reason: String,
}

/// One decoded BEP message, tagged by its wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ClusterConfig(ClusterConfig),
    Index(IndexMessage),
    Request(Request),
    Response(Response),
    Ping,
    Pong,
    IndexUpdate(IndexMessage),
    Close(Close),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::ClusterConfig(_) => MessageType::ClusterConfig,
            Message::Index(_) => MessageType::Index,
            Message::Request(_) => MessageType::Request,
            Message::Response(_) => MessageType::Response,
            Message::Ping => MessageType::Ping,
            Message::Pong => MessageType::Pong,
            Message::IndexUpdate(_) => MessageType::IndexUpdate,
            Message::Close(_) => MessageType::Close,
        }
    }

    pub fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Message::ClusterConfig(cc) => encode_cluster_config(&mut buf, cc),
            Message::Index(idx) | Message::IndexUpdate(idx) => encode_index(&mut buf, idx),
            Message::Request(r) => encode_request(&mut buf, r),
            Message::Response(r) => put_opaque(&mut buf, &r.data),
            Message::Ping | Message::Pong => {}
            Message::Close(c) => put_string(&mut buf, &c.reason),
        }
        buf
    }

    pub fn decode_body(type_: MessageType, bytes: &[u8]) -> Result<Self> {
        Ok(match type_ {
            MessageType::ClusterConfig => Message::ClusterConfig(decode_cluster_config(bytes)?),
            MessageType::Index => Message::Index(decode_index(bytes)?),
            MessageType::IndexUpdate => Message::IndexUpdate(decode_index(bytes)?),
            MessageType::Request => Message::Request(decode_request(bytes)?),
            MessageType::Response => {
                let mut reader = Reader::new(bytes);
                Message::Response(Response { data: reader.get_opaque()? })
            }
            MessageType::Ping => Message::Ping,
            MessageType::Pong => Message::Pong,
            MessageType::Close => {
                let mut reader = Reader::new(bytes);
                let reason = reader.get_string()?;
                if reason.len() > 1024 {
                    return Err(BepError::Protocol("close reason exceeds 1024 bytes".into()));
                }
                Message::Close(Close { reason })
            }
        })
    }
}

fn encode_block(buf: &mut Vec<u8>, block: &BlockInfo) {
    put_u32(buf, block.size);
    put_opaque(buf, &block.hash);
}

fn decode_block(reader: &mut Reader<'_>) -> Result<BlockInfo> {
    let size = reader.get_u32()?;
    let hash = reader.get_opaque()?;
    Ok(BlockInfo::new(size, hash))
}

fn encode_file(buf: &mut Vec<u8>, file: &FileInfo) {
    put_string(buf, &file.name);
    put_u32(buf, file.flags);
    put_u64(buf, file.modified_seconds as u64);
    put_u64(buf, file.version);
    put_u64(buf, file.local_version);
    put_u32(buf, file.blocks.len() as u32);
    for block in &file.blocks {
        encode_block(buf, block);
    }
}

fn decode_file(reader: &mut Reader<'_>) -> Result<FileInfo> {
    let name = reader.get_string()?;
    if name.len() > crate::model::index::limits::MAX_NAME_BYTES {
        return Err(BepError::Protocol(format!("file name '{name}' exceeds byte limit")));
    }
    let flags = reader.get_u32()?;
    let modified_seconds = reader.get_i64()?;
    let version = reader.get_u64()?;
    let local_version = reader.get_u64()?;
    let n_blocks = reader.get_u32()? as usize;
    if n_blocks > crate::model::index::limits::MAX_BLOCKS_PER_FILE {
        return Err(BepError::Protocol(format!(
            "file '{name}' declares {n_blocks} blocks, limit is {}",
            crate::model::index::limits::MAX_BLOCKS_PER_FILE
        )));
    }
    let mut blocks = Vec::with_capacity(n_blocks.min(1024));
    for _ in 0..n_blocks {
        blocks.push(decode_block(reader)?);
    }
    BlockInfo::with_offsets(&mut blocks);
    let file = FileInfo { name, flags, modified_seconds, version, local_version, blocks };
    file.validate().map_err(BepError::Protocol)?;
    Ok(file)
}

fn encode_index(buf: &mut Vec<u8>, idx: &IndexMessage) {
    put_string(buf, &idx.folder_id);
    put_u32(buf, idx.files.len() as u32);
    for file in &idx.files {
        encode_file(buf, file);
    }
}

fn decode_index(bytes: &[u8]) -> Result<IndexMessage> {
    let mut reader = Reader::new(bytes);
    let folder_id = reader.get_string()?;
    if folder_id.len() > crate::model::index::limits::MAX_FOLDER_ID_BYTES {
        return Err(BepError::Protocol("folder id exceeds byte limit".into()));
    }
    let n_files = reader.get_u32()? as usize;
    if n_files > crate::model::index::limits::MAX_FILES {
        return Err(BepError::Protocol(format!(
            "index declares {n_files} files, limit is {}",
            crate::model::index::limits::MAX_FILES
        )));
    }
    let mut files = Vec::with_capacity(n_files.min(4096));
    for _ in 0..n_files {
        files.push(decode_file(&mut reader)?);
    }
    Ok(IndexMessage { folder_id, files })
}

fn encode_request(buf: &mut Vec<u8>, req: &Request) {
    put_string(buf, &req.folder);
    put_string(buf, &req.name);
    put_u64(buf, req.offset);
    put_u32(buf, req.size);
    put_opaque(buf, &req.hash);
}

fn decode_request(bytes: &[u8]) -> Result<Request> {
    let mut reader = Reader::new(bytes);
    let folder = reader.get_string()?;
    let name = reader.get_string()?;
    let offset = reader.get_u64()?;
    let size = reader.get_u32()?;
    let hash = reader.get_opaque()?;
    Ok(Request { folder, name, offset, size, hash })
}

fn encode_cluster_config_device(buf: &mut Vec<u8>, dev: &ClusterConfigDevice) {
    put_opaque(buf, dev.id.as_bytes());
    put_u32(buf, dev.flags);
    put_u64(buf, dev.max_local_version);
}

fn decode_cluster_config_device(reader: &mut Reader<'_>) -> Result<ClusterConfigDevice> {
    let id_bytes = reader.get_opaque()?;
    if id_bytes.len() != 32 {
        return Err(BepError::Protocol(format!(
            "cluster config device id is {} bytes, want 32",
            id_bytes.len()
        )));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&id_bytes);
    let flags = reader.get_u32()?;
    let max_local_version = reader.get_u64()?;
    Ok(ClusterConfigDevice { id: DeviceId::from_bytes(arr), flags, max_local_version })
}

fn encode_cluster_config_folder(buf: &mut Vec<u8>, folder: &ClusterConfigFolder) {
    put_string(buf, &folder.id);
    put_u32(buf, folder.devices.len() as u32);
    for dev in &folder.devices {
        encode_cluster_config_device(buf, dev);
    }
}

fn decode_cluster_config_folder(reader: &mut Reader<'_>) -> Result<ClusterConfigFolder> {
    let id = reader.get_string()?;
    let n = reader.get_u32()? as usize;
    let mut devices = Vec::with_capacity(n.min(1024));
    for _ in 0..n {
        devices.push(decode_cluster_config_device(reader)?);
    }
    Ok(ClusterConfigFolder { id, devices })
}

fn encode_cluster_config(buf: &mut Vec<u8>, cc: &ClusterConfig) {
    put_string(buf, &cc.client_name);
    put_string(buf, &cc.client_version);
    put_u32(buf, cc.folders.len() as u32);
    for folder in &cc.folders {
        encode_cluster_config_folder(buf, folder);
    }
    put_u32(buf, cc.options.len() as u32);
    for opt in &cc.options {
        put_string(buf, &opt.key);
        put_string(buf, &opt.value);
    }
}

fn decode_cluster_config(bytes: &[u8]) -> Result<ClusterConfig> {
    let mut reader = Reader::new(bytes);
    let client_name = reader.get_string()?;
    let client_version = reader.get_string()?;
    let n_folders = reader.get_u32()? as usize;
    let mut folders = Vec::with_capacity(n_folders.min(1024));
    for _ in 0..n_folders {
        let folder = decode_cluster_config_folder(&mut reader)?;
        for dev in &folder.devices {
            if !dev.has_exactly_one_trust_flag() {
                return Err(BepError::Protocol(format!(
                    "device in folder '{}' must set exactly one of trusted/read-only",
                    folder.id
                )));
            }
        }
        folders.push(folder);
    }
    let n_options = reader.get_u32()? as usize;
    let mut options = Vec::with_capacity(n_options.min(1024));
    for _ in 0..n_options {
        let key = reader.get_string()?;
        let value = reader.get_string()?;
        options.push(ClusterConfigOption { key, value });
    }
    Ok(ClusterConfig { client_name, client_version, folders, options })
}

/// Clears flags bits that have no business surviving a decode/encode round
/// trip check in tests (kept for callers that want to assert on a
/// normalized, permission-bit-stripped copy).
pub fn strip_permission_bits(file: &mut FileInfo) {
    file.flags &= !file_flags::PERMISSION_MASK;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{device_flags, BLOCK_SIZE};

    fn sample_cluster_config() -> ClusterConfig {
        ClusterConfig {
            client_name: "bep-node".into(),
            client_version: "1.0.0".into(),
            folders: vec![ClusterConfigFolder {
                id: "default".into(),
                devices: vec![ClusterConfigDevice {
                    id: DeviceId::from_bytes([7u8; 32]),
                    flags: device_flags::TRUSTED | device_flags::INTRODUCER,
                    max_local_version: 42,
                }],
            }],
            options: vec![ClusterConfigOption { key: "k".into(), value: "v".into() }],
        }
    }

    fn sample_index() -> IndexMessage {
        IndexMessage {
            folder_id: "default".into(),
            files: vec![FileInfo {
                name: "foo.bin".into(),
                flags: 0o644,
                modified_seconds: 1_700_000_000,
                version: 2,
                local_version: 11,
                blocks: vec![
                    BlockInfo { size: BLOCK_SIZE, hash: vec![1u8; 32], offset: 0 },
                    BlockInfo { size: 68_928, hash: vec![2u8; 32], offset: BLOCK_SIZE as u64 },
                ],
            }],
        }
    }

    #[test]
    fn every_message_type_round_trips() {
        let messages = vec![
            Message::ClusterConfig(sample_cluster_config()),
            Message::Index(sample_index()),
            Message::IndexUpdate(sample_index()),
            Message::Request(Request {
                folder: "default".into(),
                name: "foo.bin".into(),
                offset: 0,
                size: BLOCK_SIZE,
                hash: vec![1u8; 32],
            }),
            Message::Response(Response { data: vec![0xAB; 131_072] }),
            Message::Ping,
            Message::Pong,
            Message::Close(Close { reason: "bye".into() }),
        ];
        for msg in messages {
            let body = msg.encode_body();
            let decoded = Message::decode_body(msg.message_type(), &body).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn close_reason_over_limit_is_rejected() {
        let mut buf = Vec::new();
        put_string(&mut buf, &"x".repeat(1025));
        assert!(Message::decode_body(MessageType::Close, &buf).is_err());
    }

    #[test]
    fn cluster_config_requires_exactly_one_trust_flag() {
        let mut cc = sample_cluster_config();
        cc.folders[0].devices[0].flags = device_flags::TRUSTED | device_flags::READ_ONLY;
        let mut buf = Vec::new();
        encode_cluster_config(&mut buf, &cc);
        assert!(decode_cluster_config(&buf).is_err());
    }

    #[test]
    fn deleted_file_with_blocks_fails_decode() {
        let mut buf = Vec::new();
        put_string(&mut buf, "default");
        put_u32(&mut buf, 1);
        put_string(&mut buf, "foo.bin");
        put_u32(&mut buf, file_flags::DELETED);
        put_u64(&mut buf, 0);
        put_u64(&mut buf, 1);
        put_u64(&mut buf, 1);
        put_u32(&mut buf, 1);
        encode_block(&mut buf, &BlockInfo { size: 10, hash: vec![0u8; 32], offset: 0 });
        assert!(decode_index(&buf).is_err());
    }
}
