mod parse_document;
