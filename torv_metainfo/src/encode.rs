//! Assembly of the canonical bencode form of a model.

use std::borrow::Cow;

use torv_bencode::{BMutAccess, BencodeMut};

use crate::file_tree::{FileTree, FileTreeLeaf, FileTreeNode};
use crate::metainfo::{File, Info, Metainfo};
use crate::parse;

fn owned_bytes(bytes: &[u8]) -> BencodeMut<'static> {
    BencodeMut::new_bytes(Cow::Owned(bytes.to_vec()))
}

fn key(key: &'static [u8]) -> Cow<'static, [u8]> {
    Cow::Borrowed(key)
}

/// Emit the canonical bencode bytes of the whole metainfo file.
pub(crate) fn metainfo_to_bytes(meta: &Metainfo) -> Vec<u8> {
    let mut root = BencodeMut::new_dict();

    {
        let root_access = root.dict_mut().unwrap();

        if let Some(announce) = meta.main_tracker() {
            root_access.insert(key(parse::ANNOUNCE_URL_KEY), owned_bytes(announce.as_bytes()));
        }
        if let Some(tiers) = meta.trackers() {
            let mut announce_list = BencodeMut::new_list();
            {
                let tiers_access = announce_list.list_mut().unwrap();
                for tier in tiers {
                    let mut tier_bencode = BencodeMut::new_list();
                    {
                        let tier_access = tier_bencode.list_mut().unwrap();
                        for tracker in tier {
                            tier_access.push(owned_bytes(tracker.as_bytes()));
                        }
                    }
                    tiers_access.push(tier_bencode);
                }
            }
            root_access.insert(key(parse::ANNOUNCE_LIST_KEY), announce_list);
        }
        if let Some(comment) = meta.comment() {
            root_access.insert(key(parse::COMMENT_KEY), owned_bytes(comment.as_bytes()));
        }
        if let Some(created_by) = meta.created_by() {
            root_access.insert(key(parse::CREATED_BY_KEY), owned_bytes(created_by.as_bytes()));
        }
        if let Some(creation_date) = meta.creation_date() {
            root_access.insert(key(parse::CREATION_DATE_KEY), BencodeMut::new_int(creation_date));
        }
        if let Some(encoding) = meta.encoding() {
            root_access.insert(key(parse::ENCODING_KEY), owned_bytes(encoding.as_bytes()));
        }
        if let Some(urls) = meta.url_list_option() {
            let mut url_list = BencodeMut::new_list();
            {
                let urls_access = url_list.list_mut().unwrap();
                for url in urls {
                    urls_access.push(owned_bytes(url.as_bytes()));
                }
            }
            root_access.insert(key(parse::URL_LIST_KEY), url_list);
        }

        if !meta.piece_layers().is_empty() {
            let mut layers = BencodeMut::new_dict();
            {
                let layers_access = layers.dict_mut().unwrap();
                for (root_hash, layer) in meta.piece_layers() {
                    let mut layer_bytes = Vec::with_capacity(layer.len() * crate::hash::SHA256_HASH_LEN);
                    for hash in layer {
                        layer_bytes.extend_from_slice(hash.as_ref());
                    }

                    layers_access.insert(Cow::Owned(root_hash.as_ref().to_vec()),
                                         BencodeMut::new_bytes(Cow::Owned(layer_bytes)));
                }
            }
            root_access.insert(key(parse::PIECE_LAYERS_KEY), layers);
        }

        for (unknown_key, value) in meta.unknown() {
            root_access.insert(Cow::Owned(unknown_key.clone()), value.clone());
        }

        root_access.insert(key(parse::INFO_KEY), info_to_bencode(meta.info()));
    }

    root.encode()
}

/// Emit the canonical bencode bytes of the info dictionary alone.
pub(crate) fn info_to_bytes(info: &Info) -> Vec<u8> {
    info_to_bencode(info).encode()
}

fn info_to_bencode(info: &Info) -> BencodeMut<'static> {
    let mut dict = BencodeMut::new_dict();

    {
        let dict_access = dict.dict_mut().unwrap();

        dict_access.insert(key(parse::NAME_KEY), owned_bytes(info.name_bytes()));
        dict_access.insert(key(parse::PIECE_LENGTH_KEY),
                           BencodeMut::new_int(info.piece_length() as i64));
        if let Some(private) = info.is_private() {
            dict_access.insert(key(parse::PRIVATE_KEY),
                               BencodeMut::new_int(if private { 1 } else { 0 }));
        }

        if let Some(v1) = info.v1() {
            let mut pieces = Vec::with_capacity(v1.pieces().len() * crate::hash::SHA1_HASH_LEN);
            for piece in v1.pieces() {
                pieces.extend_from_slice(piece);
            }
            dict_access.insert(key(parse::PIECES_KEY), BencodeMut::new_bytes(Cow::Owned(pieces)));

            if v1.directory().is_some() {
                let mut files = BencodeMut::new_list();
                {
                    let files_access = files.list_mut().unwrap();
                    for file in v1.files() {
                        files_access.push(file_to_bencode(file));
                    }
                }
                dict_access.insert(key(parse::FILES_KEY), files);
            } else {
                // Single file form stores the file fields in the info dictionary
                let file = &v1.files()[0];

                dict_access.insert(key(parse::LENGTH_KEY), BencodeMut::new_int(file.length() as i64));
                if let Some(md5sum) = file.md5sum() {
                    dict_access.insert(key(parse::MD5SUM_KEY), owned_bytes(md5sum));
                }
            }
        }

        if let Some(v2) = info.v2() {
            dict_access.insert(key(parse::META_VERSION_KEY), BencodeMut::new_int(2));
            dict_access.insert(key(parse::FILE_TREE_KEY), file_tree_to_bencode(v2.file_tree()));
        }

        for (unknown_key, value) in info.unknown() {
            dict_access.insert(Cow::Owned(unknown_key.clone()), value.clone());
        }
    }

    dict
}

fn file_to_bencode(file: &File) -> BencodeMut<'static> {
    let mut dict = BencodeMut::new_dict();

    {
        let dict_access = dict.dict_mut().unwrap();

        dict_access.insert(key(parse::LENGTH_KEY), BencodeMut::new_int(file.length() as i64));

        let mut path = BencodeMut::new_list();
        {
            let path_access = path.list_mut().unwrap();
            for component in file.path_components() {
                path_access.push(owned_bytes(component));
            }
        }
        dict_access.insert(key(parse::PATH_KEY), path);

        if let Some(md5sum) = file.md5sum() {
            dict_access.insert(key(parse::MD5SUM_KEY), owned_bytes(md5sum));
        }
        if let Some(attr) = file.attr() {
            dict_access.insert(key(parse::ATTR_KEY), owned_bytes(attr));
        }
        if let Some(symlink_path) = file.symlink_path_components() {
            let mut symlink = BencodeMut::new_list();
            {
                let symlink_access = symlink.list_mut().unwrap();
                for component in symlink_path {
                    symlink_access.push(owned_bytes(component));
                }
            }
            dict_access.insert(key(parse::SYMLINK_PATH_KEY), symlink);
        }

        for (unknown_key, value) in file.unknown() {
            dict_access.insert(Cow::Owned(unknown_key.clone()), value.clone());
        }
    }

    dict
}

fn file_tree_to_bencode(tree: &FileTree) -> BencodeMut<'static> {
    nodes_to_bencode(tree.nodes())
}

fn nodes_to_bencode(nodes: &std::collections::BTreeMap<Vec<u8>, FileTreeNode>) -> BencodeMut<'static> {
    let mut dict = BencodeMut::new_dict();

    {
        let dict_access = dict.dict_mut().unwrap();

        for (component, node) in nodes {
            let child = match node {
                FileTreeNode::Directory(children) => nodes_to_bencode(children),
                FileTreeNode::File(leaf) => leaf_to_bencode(leaf),
            };

            dict_access.insert(Cow::Owned(component.clone()), child);
        }
    }

    dict
}

fn leaf_to_bencode(leaf: &FileTreeLeaf) -> BencodeMut<'static> {
    let mut inner = BencodeMut::new_dict();

    {
        let inner_access = inner.dict_mut().unwrap();

        inner_access.insert(key(parse::LENGTH_KEY), BencodeMut::new_int(leaf.length() as i64));
        if let Some(root) = leaf.pieces_root() {
            inner_access.insert(key(parse::PIECES_ROOT_KEY), owned_bytes(root.as_ref()));
        }

        for (unknown_key, value) in leaf.unknown() {
            inner_access.insert(Cow::Owned(unknown_key.clone()), value.clone());
        }
    }

    let mut node = BencodeMut::new_dict();
    {
        let node_access = node.dict_mut().unwrap();
        node_access.insert(key(parse::FILE_TREE_LEAF_KEY), inner);
    }

    node
}
